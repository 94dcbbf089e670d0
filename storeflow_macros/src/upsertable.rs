use proc_macro::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Ident, Type};

pub fn derive_upsertable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = named_fields(input)?;
    let key = marked_field(fields, "key")?
        .or_else(|| fields.iter().find(|f| f.ident.as_ref().is_some_and(|i| i == "id")))
        .ok_or_else(|| {
            syn::Error::new_spanned(
                &input.ident,
                "Upsertable derive: no field marked with #[upsertable(key)] and no field named `id`",
            )
        })?;
    let order = marked_field(fields, "order")?;

    let key_ident = field_ident(key)?;
    let key_name = key_ident.to_string();
    let primary_value = if is_option(&key.ty) {
        quote! { self.#key_ident.as_ref().map(::std::string::ToString::to_string) }
    } else {
        quote! { ::std::option::Option::Some(::std::string::ToString::to_string(&self.#key_ident)) }
    };

    let ordering_value = match order {
        Some(field) => {
            let ident = field_ident(field)?;
            quote! {
                fn ordering_value(&self) -> ::std::option::Option<::storeflow::__private::serde_json::Value> {
                    ::storeflow::__private::serde_json::to_value(&self.#ident).ok()
                }
            }
        }
        None => quote! {},
    };

    Ok(quote! {
        impl #impl_generics ::storeflow::Identifiable for #name #ty_generics #where_clause {
            fn primary_key(&self) -> &str {
                #key_name
            }

            fn primary_value(&self) -> ::std::option::Option<::std::string::String> {
                #primary_value
            }
        }

        impl #impl_generics ::storeflow::Upsertable for #name #ty_generics #where_clause {
            fn update_dictionary(&self) -> ::storeflow::Fields {
                match ::storeflow::__private::serde_json::to_value(self) {
                    ::std::result::Result::Ok(::storeflow::__private::serde_json::Value::Object(map)) => {
                        map.into_iter().collect()
                    }
                    _ => ::storeflow::Fields::new(),
                }
            }

            #ordering_value
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<&syn::punctuated::Punctuated<Field, syn::Token![,]>> {
    if let Data::Struct(data) = &input.data {
        if let Fields::Named(fields) = &data.fields {
            return Ok(&fields.named);
        }
    }
    Err(syn::Error::new_spanned(
        &input.ident,
        "Upsertable derive: only structs with named fields are supported",
    ))
}

/// The single field carrying `#[upsertable(<marker>)]`, if any.
fn marked_field<'a>(
    fields: &'a syn::punctuated::Punctuated<Field, syn::Token![,]>,
    marker: &str,
) -> syn::Result<Option<&'a Field>> {
    let mut found: Option<&Field> = None;
    for field in fields {
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("upsertable")) {
            let mut marked = false;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("key") || meta.path.is_ident("order") {
                    marked |= meta.path.is_ident(marker);
                    Ok(())
                } else {
                    Err(meta.error("expected `key` or `order`"))
                }
            })?;
            if marked {
                if found.is_some() {
                    return Err(syn::Error::new_spanned(
                        attr,
                        format!("Upsertable derive: more than one field marked `{}`", marker),
                    ));
                }
                found = Some(field);
            }
        }
    }
    Ok(found)
}

fn field_ident(field: &Field) -> syn::Result<&Ident> {
    field
        .ident
        .as_ref()
        .ok_or_else(|| syn::Error::new_spanned(field, "Upsertable derive: unnamed field"))
}

fn is_option(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Option"),
        _ => false,
    }
}
