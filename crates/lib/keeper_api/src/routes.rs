//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_USERS: &str = "/users";
pub const POST_USERS_TOKEN: &str = "/users/token";
pub const POST_USERS_TOKEN_PROVIDER: &str = "/users/token/{provider}";
pub const POST_USERS_REFRESH_TOKEN: &str = "/users/refreshToken";
pub const POST_USERS_LOGOUT: &str = "/users/logout";

pub const TODOS: &str = "/todos";
pub const TODOS_ID: &str = "/todos/{id}";
