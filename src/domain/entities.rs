//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

/// Local record of an identity issued by the external auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: OffsetDateTime,
}

impl UserRecord {
    /// Full name when one is known, otherwise the username.
    pub fn display_name(&self) -> String {
        display_name(&self.username, &self.first_name, &self.last_name)
    }
}

pub fn display_name(username: &str, first_name: &str, last_name: &str) -> String {
    let full = format!("{} {}", first_name.trim(), last_name.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub author_id: Option<i64>,
    pub pub_date: OffsetDateTime,
    pub group_id: Option<i64>,
    /// Storage path of the attached image, relative to the media root.
    pub image: Option<String>,
}

/// The part of a user shown next to content they authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

impl AuthorRef {
    pub fn new(id: i64, username: String, first_name: &str, last_name: &str) -> Self {
        let display_name = display_name(&username, first_name, last_name);
        Self {
            id,
            username,
            display_name,
        }
    }
}

impl From<&UserRecord> for AuthorRef {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRef {
    pub id: i64,
    pub slug: String,
    pub title: String,
}

impl From<&GroupRecord> for GroupRef {
    fn from(group: &GroupRecord) -> Self {
        Self {
            id: group.id,
            slug: group.slug.clone(),
            title: group.title.clone(),
        }
    }
}

/// A post joined with its author and group for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostEntry {
    pub post: PostRecord,
    pub author: Option<AuthorRef>,
    pub group: Option<GroupRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub pub_date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentEntry {
    pub comment: CommentRecord,
    pub author: AuthorRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> UserRecord {
        UserRecord {
            id: 1,
            username: "leo".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            date_joined: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(user("Leo", "Tolstoy").display_name(), "Leo Tolstoy");
        assert_eq!(user("Leo", "").display_name(), "Leo");
    }

    #[test]
    fn display_name_falls_back_to_username() {
        assert_eq!(user("", " ").display_name(), "leo");
    }
}
