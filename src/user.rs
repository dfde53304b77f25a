use serde::{Deserialize, Serialize};

use crate::claims::Attributes;

/// Persisted fields of a user record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFields {
    /// Primary key. Holds the Firebase UID when the identifier column is `id`,
    /// otherwise it is assigned by the store on create.
    pub id: Option<String>,

    /// Dedicated Firebase UID column, used when the identifier column is not `id`.
    pub firebase_id: Option<String>,

    /// User's email address
    pub email: String,

    /// User's display name (if available)
    pub name: Option<String>,

    /// URL to the user's profile picture (if available)
    pub picture: Option<String>,

    /// Token value for the "remember me" session (if supported)
    #[serde(skip_serializing)]
    pub remember_token: Option<String>,
}

/// A user record together with its last persisted state.
///
/// The persisted snapshot drives [`User::is_dirty`], so a store write only
/// happens when a field actually changed.
#[derive(Clone, Debug, Default)]
pub struct User {
    fields: UserFields,
    original: Option<UserFields>,
}

impl User {
    /// Creates a user that has not been persisted yet.
    pub fn new() -> User {
        User::default()
    }

    /// Rehydrates a user loaded from a store.
    pub fn from_persisted(fields: UserFields) -> User {
        User {
            original: Some(fields.clone()),
            fields,
        }
    }

    /// Current field values.
    pub fn fields(&self) -> &UserFields {
        &self.fields
    }

    /// Mutable access to the current field values.
    pub fn fields_mut(&mut self) -> &mut UserFields {
        &mut self.fields
    }

    /// Whether the record has been written to the store at least once.
    pub fn exists(&self) -> bool {
        self.original.is_some()
    }

    /// Whether the current fields differ from the last persisted state.
    ///
    /// A record that was never persisted is always dirty.
    pub fn is_dirty(&self) -> bool {
        self.original.as_ref() != Some(&self.fields)
    }

    /// Overwrites fields with the given attributes.
    ///
    /// Absent optional attributes leave the stored values untouched.
    pub fn fill(&mut self, attributes: &Attributes) {
        self.fields.email.clone_from(&attributes.email);
        if let Some(name) = &attributes.name {
            self.fields.name = Some(name.clone());
        }
        if let Some(picture) = &attributes.picture {
            self.fields.picture = Some(picture.clone());
        }
    }

    /// Marks the current fields as persisted.
    pub fn sync_original(&mut self) {
        self.original = Some(self.fields.clone());
    }

    /// Consumes the record and returns its current fields.
    pub fn into_fields(self) -> UserFields {
        self.fields
    }
}

impl Serialize for User {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
