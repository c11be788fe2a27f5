pub mod attendance;
pub mod department;
pub mod employee;
pub mod job_role;
pub mod role;
pub mod site;
pub mod work_assignment;

/// `TryFrom<String>` for enums kept as their strum name in a VARCHAR column,
/// which is what `#[sqlx(try_from = "String")]` decodes through.
macro_rules! text_column {
    ($($ty:ty),+ $(,)?) => {$(
        impl TryFrom<String> for $ty {
            type Error = strum::ParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )+};
}
pub(crate) use text_column;
