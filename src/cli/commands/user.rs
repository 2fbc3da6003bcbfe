use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{
    apply_table_style, format_optional, format_timestamp, truncate_with_ellipsis,
};
use crate::db::{NewUser, Session, User, UserQuery, UserRepository};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct UserDisplay {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    full_name: String,
    #[tabled(rename = "Username")]
    user_name: String,
    #[tabled(rename = "Lang")]
    language_code: String,
    #[tabled(rename = "Referrer")]
    referrer: String,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&User> for UserDisplay {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: truncate_with_ellipsis(&user.full_name, 40),
            user_name: format_optional(user.user_name.as_deref()),
            language_code: user.language_code.clone(),
            referrer: format_optional(user.referrer_id),
            created_at: format_timestamp(&user.created_at),
        }
    }
}

fn format_table(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }

    let display: Vec<UserDisplay> = users.iter().map(|u| u.into()).collect();
    let mut table = Table::new(display);
    apply_table_style(&mut table);
    table.to_string()
}

fn format_user_detail(user: &User) -> String {
    use tabled::builder::Builder;

    let mut builder = Builder::default();

    builder.push_record(["User ID", &user.id.to_string()]);
    builder.push_record(["Name", &user.full_name]);
    builder.push_record(["Username", &format_optional(user.user_name.as_deref())]);
    builder.push_record(["Language", &user.language_code]);
    builder.push_record(["Referrer", &format_optional(user.referrer_id)]);
    builder.push_record(["Created", &format_timestamp(&user.created_at)]);
    builder.push_record(["Updated", &format_timestamp(&user.updated_at)]);

    let mut table = builder.build();
    apply_table_style(&mut table);
    table.to_string()
}

/// Create a user, or update the names of an existing one
pub async fn add_user<S: Session>(session: &mut S, user: &NewUser) -> CliResult<String> {
    let saved = session.users().create(user).await?;
    Ok(format!("✓ Saved user: {} ({})", saved.full_name, saved.id))
}

/// Get a single user by ID
pub async fn get_user<S: Session>(session: &mut S, id: i64, format: &str) -> CliResult<String> {
    let user = session
        .users()
        .get(id)
        .await?
        .ok_or(CliError::NotFound { entity: "User", id })?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&user)?),
        _ => Ok(format_user_detail(&user)),
    }
}

/// List users matching a query
pub async fn list_users<S: Session>(
    session: &mut S,
    query: &UserQuery,
    format: &str,
) -> CliResult<String> {
    let users = session.users().list(Some(query)).await?;

    match format {
        "json" => Ok(serde_json::to_string_pretty(&users)?),
        _ => Ok(format_table(&users)),
    }
}

/// Set or clear the referrer of a user
pub async fn set_referrer<S: Session>(
    session: &mut S,
    id: i64,
    referrer: Option<i64>,
) -> CliResult<String> {
    let user = session.users().set_referrer(id, referrer).await?;
    Ok(match user.referrer_id {
        Some(r) => format!("✓ User {} now referred by {}", user.id, r),
        None => format!("✓ Cleared referrer of user {}", user.id),
    })
}

/// Delete a user with their orders
pub async fn delete_user<S: Session>(session: &mut S, id: i64) -> CliResult<String> {
    if session.users().delete(id).await? {
        Ok(format!("✓ Deleted user: {}", id))
    } else {
        Err(CliError::NotFound { entity: "User", id })
    }
}
