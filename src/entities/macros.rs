//! Macros for declaring persisted models
//!
//! `impl_model!` writes the struct with the shared base columns and the
//! [`Model`](crate::core::entity::Model) implementation, so a model
//! declaration only lists its own columns.

/// Declare a persisted model
///
/// # Example
///
/// ```rust,ignore
/// use stencil::impl_model;
///
/// impl_model!(
///     /// Access role
///     Role,
///     "role",
///     unique: [["name"]],
///     {
///         name: String,
///     }
/// );
///
/// let mut session = store.session().await?;
/// let role = Repository::<Role>::new(session.as_mut())
///     .create(record(json!({"name": "admin"})))
///     .await?;
/// assert!(role.enabled);
/// ```
#[macro_export]
macro_rules! impl_model {
    (
        $(#[$meta:meta])*
        $type:ident,
        $table:literal,
        unique: [ $( [ $( $column:literal ),+ $(,)? ] ),* $(,)? ],
        {
            $( $(#[$field_meta:meta])* $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $type {
            /// Store-assigned primary key
            pub id: i64,

            pub created_at: ::chrono::DateTime<::chrono::Utc>,

            pub updated_at: ::chrono::DateTime<::chrono::Utc>,

            /// Soft availability flag
            pub enabled: bool,

            $( $(#[$field_meta])* pub $field : $field_type, )*
        }

        impl $crate::core::entity::Model for $type {
            const TABLE: &'static str = $table;

            const UNIQUE: &'static [&'static [&'static str]] = &[ $( &[ $( $column ),+ ] ),* ];

            fn id(&self) -> i64 {
                self.id
            }

            fn created_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.created_at
            }

            fn updated_at(&self) -> ::chrono::DateTime<::chrono::Utc> {
                self.updated_at
            }

            fn enabled(&self) -> bool {
                self.enabled
            }
        }

        impl $type {
            /// Lookup selecting exactly this row
            pub fn lookup(&self) -> $crate::core::entity::Lookup {
                $crate::core::entity::Lookup::by_id(self.id)
            }
        }
    };

    (
        $(#[$meta:meta])*
        $type:ident,
        $table:literal,
        {
            $( $(#[$field_meta:meta])* $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        $crate::impl_model!(
            $(#[$meta])*
            $type,
            $table,
            unique: [],
            {
                $( $(#[$field_meta])* $field : $field_type ),*
            }
        );
    };
}
