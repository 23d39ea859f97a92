extern crate proc_macro;
use proc_macro::TokenStream;

mod portable_object_macro;


/// Marks a struct or enum as able to cross the event bus and configuration boundaries.
///
/// Adds `Debug`, `Clone`, `serde::Serialize` and `serde::Deserialize` to the item's derive
/// list, merging with any derives that are already present.
#[proc_macro_attribute]
pub fn portable(attr: TokenStream, body: TokenStream) -> TokenStream {
	return portable_object_macro::portable_object(attr, body);
}
