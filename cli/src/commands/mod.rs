mod calories;
mod helpers;
mod meals;
mod users;

pub(crate) use calories::{CaloriesArgs, cmd_calories};
pub(crate) use meals::{cmd_meals_import, cmd_meals_list};
pub(crate) use users::cmd_users_list;
