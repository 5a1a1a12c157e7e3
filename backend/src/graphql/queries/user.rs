use super::prelude::*;

#[derive(Default)]
pub struct UserQueries;

#[Object]
impl UserQueries {
    /// The user behind the request's credential, or null without one
    async fn me(&self, ctx: &Context<'_>) -> Option<User> {
        ctx.try_current_user().map(|user| User::from(user.0.clone()))
    }
}
