mod upsertable;

use proc_macro::TokenStream;

/// Derive `Identifiable` and `Upsertable` for a named-field struct.
///
/// # Usage
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Upsertable)]
/// struct User {
///     #[upsertable(key)]
///     pub uuid: String,
///     pub name: String,
///     #[upsertable(order)]
///     pub updated_at: i64,
/// }
/// ```
///
/// - `#[upsertable(key)]` marks the primary key field. If omitted, a field
///   named `id` is used. `Option<T>` keys yield no primary value when `None`.
/// - `#[upsertable(order)]` marks the field batches are sorted by.
///
/// The update dictionary is the struct serialized with serde, so the struct
/// must implement `Serialize` and `Debug`.
#[proc_macro_derive(Upsertable, attributes(upsertable))]
pub fn derive_upsertable(input: TokenStream) -> TokenStream {
    upsertable::derive_upsertable(input)
}
