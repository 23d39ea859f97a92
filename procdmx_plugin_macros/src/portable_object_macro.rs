use proc_macro::TokenStream;
use quote::ToTokens;
use proc_macro2::{Delimiter, TokenTree, Span};
use syn::{
	punctuated::Punctuated,
	parse::Parser,
	Attribute,
	Path,
};


pub fn portable_object(attr: TokenStream, body: TokenStream) -> TokenStream {
	// Extra derives can be requested inline, eg. `#[portable(Copy, PartialEq)]`
	let requested_traits = match Punctuated::<Path, syn::Token![,]>::parse_terminated.parse(attr) {
		Ok(requested_traits) => requested_traits.into_iter().collect::<Vec<Path>>(),
		Err(error) => return error.into_compile_error().into(),
	};

	if let Ok(mut input) = syn::parse::<syn::ItemStruct>(body.clone()) {
		if let Some(error) = edit_attributes(&mut input.attrs, requested_traits) { return error; }
		return input.into_token_stream().into();
	} else if let Ok(mut input) = syn::parse::<syn::ItemEnum>(body) {
		if let Some(error) = edit_attributes(&mut input.attrs, requested_traits) { return error; }
		return input.into_token_stream().into();
	}

	return syn::Error::new(Span::call_site(), "#[portable] can only be applied to structs and enums")
		.into_compile_error()
		.into();
}

/// Pulls every `#[derive(...)]` off the item and replaces them with a single merged derive
/// that also includes the portable traits.
fn edit_attributes(attrs: &mut Vec<Attribute>, requested_traits: Vec<Path>) -> Option<TokenStream> {
	let mut all_derived_traits = Vec::<Path>::new();
	let mut derive_attributes = Vec::<Attribute>::new();
	attrs.retain(|attr| {
		if !attr.path.is_ident("derive") {
			return true;
		}
		derive_attributes.push(attr.clone());
		return false;
	});
	for derive in derive_attributes {
		let mut tokens = derive.tokens.clone().into_iter();
		match [tokens.next(), tokens.next()] {
			[Some(TokenTree::Group(group)), None]
				if group.delimiter() == Delimiter::Parenthesis =>
			{
				match Punctuated::<Path, syn::Token![,]>::parse_terminated
					.parse2(group.stream())
				{
					Ok(derived_traits) => push_unique(&mut all_derived_traits, derived_traits),
					Err(e) => return Some(e.into_compile_error().into()),
				}
			}
			_ => {
				return Some(syn::Error::new_spanned(derive, "malformed derive")
					.into_compile_error()
					.into())
			}
		}
	}

	push_unique(&mut all_derived_traits, requested_traits);
	push_unique(&mut all_derived_traits, [
		syn::parse_quote!(Debug),
		syn::parse_quote!(Clone),
		syn::parse_quote!(serde::Serialize),
		syn::parse_quote!(serde::Deserialize),
	]);

	attrs.insert(0, syn::parse_quote! {
		#[derive( #(#all_derived_traits),* )]
	});

	return None;
}

fn push_unique(traits: &mut Vec<Path>, new_traits: impl IntoIterator<Item = Path>) {
	for new_trait in new_traits {
		if !traits.contains(&new_trait) {
			traits.push(new_trait);
		}
	}
}
