//! HTTP handlers of the user endpoints

use super::forms::{ListUsersQuery, LoginForm, RegisterForm};
use super::models::User;
use super::schemas::{AccessTokenView, LoginView, UserView};
use super::service::{self, Credentials, NewUser};
use crate::core::auth::{AuthContext, DenyReason};
use crate::core::entity::Lookup;
use crate::core::error::ApiResult;
use crate::core::pagination::{DEFAULT_PAGE, DEFAULT_PER_PAGE, Page, Pagination};
use crate::core::repository::Repository;
use crate::core::response::Envelope;
use crate::core::store::Session;
use crate::core::validation::{Parsed, ParsedQuery};
use crate::server::AppContext;
use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{Value, json};

pub async fn index() -> Json<Value> {
    Json(json!({"hello": "world"}))
}

/// POST /api/user/register
pub async fn register(
    State(ctx): State<AppContext>,
    Parsed(form, ..): Parsed<RegisterForm>,
) -> ApiResult<Envelope<UserView>> {
    let input: NewUser = form.into_typed()?;
    let mut session = ctx.session().await?;
    let user = service::register_user(session.as_mut(), &ctx.hasher, input).await?;
    Ok(Envelope::ok(UserView::new(&user, &[])))
}

/// POST /api/user/login
pub async fn login(
    State(ctx): State<AppContext>,
    Parsed(form, ..): Parsed<LoginForm>,
) -> ApiResult<Envelope<LoginView>> {
    let credentials: Credentials = form.into_typed()?;
    let mut session = ctx.session().await?;
    let user = service::authenticate(
        session.as_mut(),
        &ctx.hasher,
        &credentials.username,
        &credentials.password,
    )
    .await?;

    let roles = service::roles_of(session.as_mut(), &user).await?;
    let names = service::role_names(&roles);
    let pair = ctx.tokens.issue_pair(user.id, &user.username, &names)?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Envelope::ok(LoginView {
        user: UserView::new(&user, &roles),
        access_token: pair.access.token,
        refresh_token: pair.refresh.token,
    }))
}

/// Load the account behind a token; gone or locked accounts invalidate it
async fn token_owner(session: &mut dyn Session, auth: &AuthContext) -> ApiResult<User> {
    let Some(user_id) = auth.user_id() else {
        return Err(DenyReason::MissingCredentials.into());
    };
    match Repository::<User>::new(session).get_by_id(user_id).await? {
        Some(user) if user.can_login() => Ok(user),
        _ => Err(DenyReason::InvalidToken("account is no longer available".into()).into()),
    }
}

/// GET /api/user/login
pub async fn current_user(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Envelope<UserView>> {
    let mut session = ctx.session().await?;
    let user = token_owner(session.as_mut(), &auth).await?;
    let roles = service::roles_of(session.as_mut(), &user).await?;
    Ok(Envelope::ok(UserView::new(&user, &roles)))
}

/// POST /api/user/logout
///
/// Revokes the presented token and its login session, which takes the
/// paired refresh token down with it.
pub async fn logout(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Envelope> {
    let AuthContext::User {
        user_id,
        token_id,
        session_id,
        expires_at,
        ..
    } = &auth
    else {
        return Err(DenyReason::MissingCredentials.into());
    };

    ctx.blocklist.revoke(token_id, *expires_at).await?;
    let session_expires = (chrono::Utc::now() + ctx.tokens.refresh_ttl()).timestamp();
    ctx.blocklist.revoke(session_id, session_expires).await?;
    tracing::info!(user_id = *user_id, "user logged out");
    Ok(Envelope::ok(json!({})))
}

/// POST /api/user/refresh
pub async fn refresh(
    State(ctx): State<AppContext>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Envelope<AccessTokenView>> {
    let mut session = ctx.session().await?;
    let user = token_owner(session.as_mut(), &auth).await?;
    let roles = service::roles_of(session.as_mut(), &user).await?;
    let Some(session_id) = auth.session_id() else {
        return Err(DenyReason::MissingCredentials.into());
    };
    let access = ctx.tokens.issue_access(
        session_id,
        user.id,
        &user.username,
        &service::role_names(&roles),
    )?;
    Ok(Envelope::ok(AccessTokenView {
        access_token: access.token,
    }))
}

/// GET /api/users
pub async fn list_users(
    State(ctx): State<AppContext>,
    ParsedQuery(query, ..): ParsedQuery<ListUsersQuery>,
) -> ApiResult<Envelope<Page<UserView>>> {
    let mut lookup = Lookup::new();
    if let Some(username) = query.str("username") {
        lookup = lookup.eq("username", username);
    }
    if let Some(enabled) = query.bool("enabled") {
        lookup = lookup.eq("enabled", enabled);
    }
    let pagination = Pagination::new(
        query.i64("page").map_or(DEFAULT_PAGE, |p| p.max(1) as u64),
        query.i64("per_page").map_or(DEFAULT_PER_PAGE, |p| p.max(1) as u64),
    );

    let mut session = ctx.session().await?;
    let page = Repository::<User>::new(session.as_mut())
        .paginate(&lookup, pagination)
        .await?;

    let mut views = Vec::with_capacity(page.items.len());
    for user in &page.items {
        let roles = service::roles_of(session.as_mut(), user).await?;
        views.push(UserView::new(user, &roles));
    }
    Ok(Envelope::ok(Page::new(views, pagination, page.total)))
}
