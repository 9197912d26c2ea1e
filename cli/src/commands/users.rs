use anyhow::Result;

use mealmind_core::service::MealMindService;

use super::helpers::print_user_table;

pub(crate) fn cmd_users_list(service: &MealMindService, json: bool) -> Result<()> {
    let users = service.list_users()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
        return Ok(());
    }

    if users.is_empty() {
        println!("No registered users.");
        return Ok(());
    }
    print_user_table(&users);
    println!("{} user(s)", users.len());
    Ok(())
}
