mod encode;
mod enums;
mod partialclone;

use proc_macro::TokenStream;

/// Implement the `std::fmt::Display` trait for the given enum. Only supports enums which have only
/// fieldless variants.
///
/// This macro also implements a method `to_str(&self) -> &'static str` for cases where an owned
/// String is not needed.
///
/// # Panics
///
/// This macro will panic if applied to a struct, a union, or an enum with any variants that have
/// fields.
#[proc_macro_derive(EnumDisplay)]
pub fn enum_display(input: TokenStream) -> TokenStream {
    enums::enum_display(input)
}

/// Implement the `std::str::FromStr` trait for the given enum, with `FromStr::Err` set to `String`.
/// Only supports enums which have only fieldless variants. The generated implementation will be
/// case-insensitive.
#[proc_macro_derive(EnumFromStr)]
pub fn enum_from_str(input: TokenStream) -> TokenStream {
    enums::enum_from_str(input)
}

/// On an enum with only fieldless variants, add an `ALL` constant of type `[Self; N]` that contains
/// every variant of the enum, in declaration order.
#[proc_macro_derive(EnumAll)]
pub fn enum_all(input: TokenStream) -> TokenStream {
    enums::enum_all(input)
}

/// Implements the `bincode::Encode` trait for the given type, with a fake implementation that
/// does not encode anything and always returns `Ok(())`.
///
/// Used for fields such as ROM images and disc images that are read-only and do not need to be
/// persisted in a save state.
#[proc_macro_derive(FakeEncode)]
pub fn fake_encode(input: TokenStream) -> TokenStream {
    encode::fake_encode(input)
}

/// Implements the `bincode::Decode` and `bincode::BorrowDecode` traits for the given type, with
/// fake implementations that do not decode anything and always return `Ok(Self::default())`.
///
/// The type must implement `Default`.
#[proc_macro_derive(FakeDecode)]
pub fn fake_decode(input: TokenStream) -> TokenStream {
    encode::fake_decode(input)
}

/// Implement the `jgenesis_common::frontend::PartialClone` trait for a given struct or enum.
///
/// Fields that are not marked with a `#[partial_clone]` attribute will be cloned using that type's
/// implementation of the `Clone` trait.
///
/// Fields marked with `#[partial_clone(default)]` will not be cloned, and instead the partial clone
/// will contain the default value for that type. This is used for large read-only buffers (ROMs,
/// disc images, translated code arenas) that a debugger-facing snapshot does not need to duplicate.
///
/// Fields marked with `#[partial_clone(partial)]` will be cloned using that type's own
/// implementation of `PartialClone`.
#[proc_macro_derive(PartialClone, attributes(partial_clone))]
pub fn partial_clone(input: TokenStream) -> TokenStream {
    partialclone::partial_clone(input)
}
