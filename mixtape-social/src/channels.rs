use thiserror::Error;

use crate::{
    Database, DatabaseError, MediaStorage, MediaStorageError, MediaUpload, PrimaryKey,
    ProfileData, SocialContext, SocialEvent, StreamControlPlane, UpdatedUser, UserData,
};

/// The follow graph between accounts, plus the channel-facing profile
/// operations: the aggregated profile view, account details and avatars.
pub struct Channels<Db, St, Cp> {
    context: SocialContext<Db, St, Cp>,
}

#[derive(Debug, Error)]
pub enum ChannelsError {
    #[error("A channel cannot follow itself")]
    SelfFollow,
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error(transparent)]
    Storage(#[from] MediaStorageError),
}

impl<Db, St, Cp> Channels<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    pub fn new(context: &SocialContext<Db, St, Cp>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates a follow edge. Fails with a conflict if the edge already
    /// exists, this is not a toggle.
    pub async fn follow(
        &self,
        follower_id: PrimaryKey,
        channel_id: PrimaryKey,
    ) -> Result<(), ChannelsError> {
        if follower_id == channel_id {
            return Err(ChannelsError::SelfFollow);
        }

        // Ensure a missing target surfaces as not found
        let _ = self.context.database.user_by_id(channel_id).await?;

        self.context
            .database
            .create_follow(follower_id, channel_id)
            .await?;

        self.context.emit(SocialEvent::ChannelFollowed {
            follower_id,
            followee_id: channel_id,
        });

        Ok(())
    }

    /// Removes a follow edge. Fails if no edge exists.
    pub async fn unfollow(
        &self,
        follower_id: PrimaryKey,
        channel_id: PrimaryKey,
    ) -> Result<(), ChannelsError> {
        self.context
            .database
            .delete_follow(follower_id, channel_id)
            .await?;

        self.context.emit(SocialEvent::ChannelUnfollowed {
            follower_id,
            followee_id: channel_id,
        });

        Ok(())
    }

    pub async fn is_following(
        &self,
        follower_id: PrimaryKey,
        channel_id: PrimaryKey,
    ) -> Result<bool, DatabaseError> {
        self.context
            .database
            .is_following(follower_id, channel_id)
            .await
    }

    /// The aggregated profile view of a channel. Read-only. The handle is
    /// matched case-insensitively, and `is_followed` is false for
    /// anonymous viewers.
    pub async fn profile(
        &self,
        username: &str,
        viewer_id: Option<PrimaryKey>,
    ) -> Result<ProfileData, DatabaseError> {
        self.context
            .database
            .profile_by_username(username, viewer_id)
            .await
    }

    pub async fn followers(&self, user_id: PrimaryKey) -> Result<Vec<UserData>, DatabaseError> {
        self.context.database.followers_of(user_id).await
    }

    pub async fn following(&self, user_id: PrimaryKey) -> Result<Vec<UserData>, DatabaseError> {
        self.context.database.following_of(user_id).await
    }

    /// Updates display name and/or email of an account
    pub async fn update_account(
        &self,
        updated_user: UpdatedUser,
    ) -> Result<UserData, DatabaseError> {
        self.context.database.update_user(updated_user).await
    }

    /// Replaces the avatar of an account, deleting the previous one from
    /// object storage first
    pub async fn change_avatar(
        &self,
        user_id: PrimaryKey,
        upload: MediaUpload,
    ) -> Result<UserData, ChannelsError> {
        let user = self.context.database.user_by_id(user_id).await?;

        if let Some(old_avatar) = &user.avatar_url {
            self.context.media.delete(old_avatar).await?;
        }

        let stored = self.context.media.store(upload).await?;

        let updated = self
            .context
            .database
            .update_user(UpdatedUser {
                id: user_id,
                avatar_url: Some(stored.url),
                ..Default::default()
            })
            .await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{test_context, test_user};

    #[tokio::test]
    async fn test_follow_is_not_a_toggle() {
        let context = test_context();
        let channels = Channels::new(&context);

        let follower = test_user(&context, "follower").await;
        let channel = test_user(&context, "channel").await;

        channels
            .follow(follower.id, channel.id)
            .await
            .expect("follows");

        // A second follow fails loudly instead of toggling off
        let duplicate = channels.follow(follower.id, channel.id).await;
        assert!(matches!(
            duplicate,
            Err(ChannelsError::Db(DatabaseError::Conflict { .. }))
        ));

        channels
            .unfollow(follower.id, channel.id)
            .await
            .expect("unfollows");

        let missing = channels.unfollow(follower.id, channel.id).await;
        assert!(matches!(
            missing,
            Err(ChannelsError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_self_follow_is_rejected() {
        let context = test_context();
        let channels = Channels::new(&context);

        let user = test_user(&context, "narcissus").await;
        let result = channels.follow(user.id, user.id).await;

        assert!(matches!(result, Err(ChannelsError::SelfFollow)));
    }

    #[tokio::test]
    async fn test_follow_missing_channel() {
        let context = test_context();
        let channels = Channels::new(&context);

        let follower = test_user(&context, "follower").await;
        let result = channels.follow(follower.id, 999).await;

        assert!(matches!(
            result,
            Err(ChannelsError::Db(DatabaseError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_profile_aggregation() {
        let context = test_context();
        let channels = Channels::new(&context);

        let a = test_user(&context, "amber").await;
        let b = test_user(&context, "birch").await;
        let c = test_user(&context, "cedar").await;

        channels.follow(a.id, b.id).await.expect("a follows b");
        channels.follow(c.id, b.id).await.expect("c follows b");
        channels.follow(b.id, a.id).await.expect("b follows a");

        let profile = channels.profile("birch", Some(a.id)).await.expect("profile");

        assert_eq!(profile.follower_count, 2);
        assert_eq!(profile.following_count, 1);
        assert!(profile.is_followed);

        // Anonymous viewers are never followers
        let anonymous = channels.profile("birch", None).await.expect("profile");
        assert!(!anonymous.is_followed);

        // Non-followers see the same counts with the flag unset
        let other = channels.profile("birch", Some(b.id)).await.expect("profile");
        assert_eq!(other.follower_count, 2);
        assert!(!other.is_followed);
    }

    #[tokio::test]
    async fn test_profile_handle_is_case_insensitive() {
        let context = test_context();
        let channels = Channels::new(&context);

        let _ = test_user(&context, "mapleleaf").await;

        let profile = channels.profile("MapleLeaf", None).await.expect("profile");
        assert_eq!(profile.user.username, "mapleleaf");

        let missing = channels.profile("nobody", None).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_follow_listings() {
        let context = test_context();
        let channels = Channels::new(&context);

        let a = test_user(&context, "amber").await;
        let b = test_user(&context, "birch").await;
        let c = test_user(&context, "cedar").await;

        channels.follow(a.id, b.id).await.expect("follows");
        channels.follow(a.id, c.id).await.expect("follows");
        channels.follow(c.id, b.id).await.expect("follows");

        let following: Vec<_> = channels
            .following(a.id)
            .await
            .expect("lists")
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert_eq!(following.len(), 2);
        assert!(following.contains(&b.id) && following.contains(&c.id));

        let followers: Vec<_> = channels
            .followers(b.id)
            .await
            .expect("lists")
            .into_iter()
            .map(|u| u.id)
            .collect();

        assert_eq!(followers.len(), 2);
        assert!(followers.contains(&a.id) && followers.contains(&c.id));

        assert!(channels.is_following(a.id, b.id).await.unwrap());
        assert!(!channels.is_following(b.id, a.id).await.unwrap());
    }
}
