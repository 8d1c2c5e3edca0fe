use rocket::{
    http::Status,
    request::{FromRequest, Outcome, Request},
};

/// Header carrying the authenticated voter identity, set by the
/// authentication collaborator in front of this service.
pub const VOTER_ID_HEADER: &str = "X-Voter-Id";

/// The identity of an authenticated voter. Authentication itself is an
/// external collaborator; this guard only consumes the identity it
/// established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterIdentity(String);

impl VoterIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterIdentity {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match req.headers().get_one(VOTER_ID_HEADER) {
            Some(id) if !id.is_empty() => Outcome::Success(VoterIdentity(id.to_string())),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
