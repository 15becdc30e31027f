use axum::{
    extract::{Multipart, Path, State},
    routing::{get, patch, post},
    Json,
};
use mixtape_social::{Credentials, NewAccount, UpdatedUser};

use crate::{
    auth::{OptionalSession, Session},
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        ChangePasswordSchema, LoginSchema, RegisterSchema, UpdateAccountSchema, ValidatedJson,
    },
    serialized::{Channel, LoginResult, Message, ToSerialized, User},
    upload::FormData,
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/users/register",
    tag = "users",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn register(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Json<LoginResult>> {
    let user = context
        .social
        .auth
        .register(NewAccount {
            username: body.username,
            email: body.email,
            password: body.password.clone(),
            display_name: body.display_name,
        })
        .await?;

    // A fresh account comes with a session
    let session = context
        .social
        .auth
        .login(Credentials {
            identifier: user.username,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/users/login",
    tag = "users",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult)
    )
)]
async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Json<LoginResult>> {
    let session = context
        .social
        .auth
        .login(Credentials {
            identifier: body.username_or_email,
            password: body.password,
        })
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/users/logout",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn logout(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Message>> {
    context.social.auth.logout(session.token()).await?;

    Ok(Json(Message::new("Logged out successfully")))
}

#[utoipa::path(
    get,
    path = "/v1/users/current-user",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn current_user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

#[utoipa::path(
    post,
    path = "/v1/users/change-password",
    tag = "users",
    request_body = ChangePasswordSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn change_password(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<ChangePasswordSchema>,
) -> ServerResult<Json<Message>> {
    if body.new_password != body.confirm_password {
        return Err(ServerError::BadRequest(
            "Passwords do not match".to_string(),
        ));
    }

    context
        .social
        .auth
        .change_password(session.user().id, &body.old_password, &body.new_password)
        .await?;

    Ok(Json(Message::new("Password changed successfully")))
}

#[utoipa::path(
    patch,
    path = "/v1/users/update-account",
    tag = "users",
    request_body = UpdateAccountSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn update_account(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<UpdateAccountSchema>,
) -> ServerResult<Json<User>> {
    if body.display_name.is_none() && body.email.is_none() {
        return Err(ServerError::BadRequest(
            "Either displayName or email is required".to_string(),
        ));
    }

    let updated = context
        .social
        .channels
        .update_account(UpdatedUser {
            id: session.user().id,
            display_name: body.display_name,
            email: body.email.map(|e| e.to_lowercase()),
            avatar_url: None,
        })
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    patch,
    path = "/v1/users/change-avatar",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User)
    )
)]
async fn change_avatar(
    session: Session,
    State(context): State<ServerContext>,
    multipart: Multipart,
) -> ServerResult<Json<User>> {
    let mut form = FormData::from_multipart(multipart).await?;
    let avatar = form.file("avatar")?;

    let updated = context
        .social
        .channels
        .change_avatar(session.user().id, avatar)
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/users/c/{username}",
    tag = "users",
    responses(
        (status = 200, body = Channel)
    )
)]
async fn profile(
    session: OptionalSession,
    State(context): State<ServerContext>,
    Path(username): Path<String>,
) -> ServerResult<Json<Channel>> {
    let profile = context
        .social
        .channels
        .profile(&username, session.viewer_id())
        .await?;

    Ok(Json(profile.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/users/follow/{channel_id}",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn follow(
    session: Session,
    State(context): State<ServerContext>,
    Path(channel_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .channels
        .follow(session.user().id, channel_id)
        .await?;

    Ok(Json(Message::new("Channel followed successfully")))
}

#[utoipa::path(
    post,
    path = "/v1/users/unfollow/{channel_id}",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn unfollow(
    session: Session,
    State(context): State<ServerContext>,
    Path(channel_id): Path<i32>,
) -> ServerResult<Json<Message>> {
    context
        .social
        .channels
        .unfollow(session.user().id, channel_id)
        .await?;

    Ok(Json(Message::new("Channel unfollowed successfully")))
}

#[utoipa::path(
    get,
    path = "/v1/users/followed-channels",
    tag = "users",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn followed_channels(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<User>>> {
    let following = context.social.channels.following(session.user().id).await?;

    Ok(Json(following.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/current-user", get(current_user))
        .route("/change-password", post(change_password))
        .route("/update-account", patch(update_account))
        .route("/change-avatar", patch(change_avatar))
        .route("/c/:username", get(profile))
        .route("/follow/:channel_id", post(follow))
        .route("/unfollow/:channel_id", post(unfollow))
        .route("/followed-channels", get(followed_channels))
}
