use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::relationships::model::{UserId, UserProfile};
use crate::schema::users;

#[derive(Queryable, Selectable, PartialEq, Clone, Debug)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: UserId::from(user.id),
            email: user.email,
            username: user.username,
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

#[derive(Insertable, Clone)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
}
