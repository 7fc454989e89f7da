//! User command handlers

use anyhow::{anyhow, Result};

use linkshare_core::{ResourceService, UserDirectory};

use crate::output::Output;

/// Register a new user
pub fn add(
    service: &ResourceService,
    username: String,
    email: String,
    output: &Output,
) -> Result<()> {
    let user = UserDirectory::new(service.connection()).register(&username, &email)?;
    output.print_user(&user);
    Ok(())
}

/// Show a user by id
pub fn show(service: &ResourceService, user_id: i64, output: &Output) -> Result<()> {
    let user = UserDirectory::new(service.connection())
        .get(user_id)?
        .ok_or_else(|| anyhow!("User not found: {}", user_id))?;
    output.print_user(&user);
    Ok(())
}

/// Make the acting user follow another user
pub fn follow(
    service: &ResourceService,
    follower_id: i64,
    followed_id: i64,
    output: &Output,
) -> Result<()> {
    let users = UserDirectory::new(service.connection());
    if users.get(followed_id)?.is_none() {
        return Err(anyhow!("User not found: {}", followed_id));
    }

    let message = if users.follows(follower_id, followed_id)? {
        format!("User {} already follows user {}", follower_id, followed_id)
    } else {
        users.follow(follower_id, followed_id)?;
        format!("User {} now follows user {}", follower_id, followed_id)
    };
    output.success(&message);
    Ok(())
}
