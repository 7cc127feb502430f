use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::domain::UserId;

/// Which header the identity proxy in front of us puts the user id into
pub struct AuthSettings {
    pub user_header: String,
}

/// The user the request was authenticated as. Requests without a valid identity are rejected with 401.
pub struct AuthenticatedUser(pub UserId);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(settings) = request.rocket().state::<AuthSettings>() else {
            return Outcome::Error((Status::InternalServerError, "Auth settings not configured"));
        };
        match request.headers().get_one(&settings.user_header).map(UserId::new) {
            Some(Ok(user)) => Outcome::Success(AuthenticatedUser(user)),
            Some(Err(_)) => Outcome::Error((Status::Unauthorized, "Malformed user id")),
            None => Outcome::Error((Status::Unauthorized, "Missing user id")),
        }
    }
}
