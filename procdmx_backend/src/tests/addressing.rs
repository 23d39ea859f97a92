use crate::mixer_utils::{
	addressing::{
		fix_ch_input,
		render_universe,
	},
	bit_assignment::ChannelBitAssignments,
	state::{
		ChannelMap,
		ChannelValue,
		MixMode,
		MixValue,
		Output,
	},
};

fn value(output: Output, value: ChannelValue) -> MixValue {
	return MixValue::new(output, value, MixMode::GreaterPriority);
}

#[test]
fn resolves_default_universe() {
	let assignments = ChannelBitAssignments::new();
	let entries = vec![
		value(Output::on_default(3), ChannelValue::new(10.0)),
		value(Output::new(2, 4), ChannelValue::new(20.0)),
	];

	let resolved = fix_ch_input(entries.clone(), Some(7), &assignments);
	let keys: Vec<(u32, u16)> = resolved.accepted.iter().map(|(key, _)| *key).collect();
	assert_eq!(keys, vec![(7, 3), (2, 4)]);
	assert_eq!(resolved.accepted[0].1.output, Output::new(7, 3));

	// Without a default, those entries go nowhere
	let resolved = fix_ch_input(entries, None, &assignments);
	assert_eq!(resolved.accepted.len(), 1);
	assert!(resolved.rejected.is_empty());
}

#[test]
fn rejects_lsb_addressing() {
	let mut assignments = ChannelBitAssignments::new();
	assignments.create(1, 1, 2).unwrap();

	let resolved = fix_ch_input(vec![
		value(Output::new(1, 1), ChannelValue::new(10.0)),
		value(Output::new(1, 2), ChannelValue::new(20.0)),
		value(Output::new(2, 2), ChannelValue::new(30.0)),
	], None, &assignments);
	assert_eq!(resolved.accepted.len(), 2);
	assert_eq!(resolved.rejected.len(), 1);
	assert_eq!(resolved.rejected[0].output, Output::new(1, 2));
}

#[test]
fn renders_channels_from_one() {
	let assignments = ChannelBitAssignments::new();
	let mut values = ChannelMap::default();
	values.insert((1, 1), value(Output::new(1, 1), ChannelValue::new(255.0)));
	values.insert((1, 512), value(Output::new(1, 512), ChannelValue::new(127.6)));
	values.insert((2, 5), value(Output::new(2, 5), ChannelValue::new(9.0)));

	let frame = render_universe(1, &values, &assignments);
	assert_eq!(frame[0], 255);
	assert_eq!(frame[511], 128);
	assert_eq!(frame[4], 0);
	assert_eq!(frame.iter().filter(|byte| **byte != 0).count(), 2);
}

#[test]
fn renders_sixteen_bit_pairs() {
	let mut assignments = ChannelBitAssignments::new();
	assignments.create(1, 10, 20).unwrap();
	assignments.create(1, 30, 31).unwrap();

	let mut values = ChannelMap::default();
	values.insert((1, 10), value(Output::new(1, 10), ChannelValue::with_lsb(0x12 as f64, 0x34 as f64)));
	values.insert((1, 30), value(Output::new(1, 30), ChannelValue::new(200.0)));

	let frame = render_universe(1, &values, &assignments);
	assert_eq!(frame[9], 0x12);
	assert_eq!(frame[19], 0x34);

	// No LSB repeats the MSB
	assert_eq!(frame[29], 200);
	assert_eq!(frame[30], 200);
}
