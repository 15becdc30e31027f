use crossbeam::channel::{Receiver, Sender};

use crate::PrimaryKey;

pub type EventSender = Sender<SocialEvent>;
pub type EventReceiver = Receiver<SocialEvent>;

/// Events emitted by the social system
#[derive(Debug, Clone)]
pub enum SocialEvent {
    /// A new song was added to the catalog
    SongPublished {
        song_id: PrimaryKey,
        owner_id: PrimaryKey,
    },
    /// A like edge was created or removed
    LikeToggled {
        user_id: PrimaryKey,
        song_id: PrimaryKey,
        liked: bool,
        likes_count: i64,
    },
    /// A follow edge was created
    ChannelFollowed {
        follower_id: PrimaryKey,
        followee_id: PrimaryKey,
    },
    /// A follow edge was removed
    ChannelUnfollowed {
        follower_id: PrimaryKey,
        followee_id: PrimaryKey,
    },
    /// The control plane reported an ingress going live
    StreamWentLive {
        stream_id: PrimaryKey,
        host_id: PrimaryKey,
    },
    /// The control plane reported an ingress ending
    StreamWentOffline {
        stream_id: PrimaryKey,
        host_id: PrimaryKey,
    },
}
