use usergate_core::{PublicUser, UserId};

/// Authenticated caller for a request.
///
/// Inserted by the request gate from the verified token; handlers behind the
/// gate can rely on it being present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(PublicUser);

impl CurrentUser {
    pub fn new(user: PublicUser) -> Self {
        Self(user)
    }

    pub fn id(&self) -> UserId {
        self.0.id
    }

    pub fn user(&self) -> &PublicUser {
        &self.0
    }

    pub fn into_inner(self) -> PublicUser {
        self.0
    }
}
