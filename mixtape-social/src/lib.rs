mod auth;
mod catalog;
mod channels;
mod control;
mod db;
mod engagement;
mod events;
mod playlists;
mod storage;
mod streams;
mod util;

#[cfg(test)]
mod test_util;

use std::sync::Arc;

use crossbeam::channel::unbounded;

pub use auth::*;
pub use catalog::*;
pub use channels::*;
pub use control::*;
pub use db::*;
pub use engagement::*;
pub use events::*;
pub use playlists::*;
pub use storage::*;
pub use streams::*;

/// The mixtape social system, facilitating accounts, the song catalog,
/// engagement, playlists, stream sessions, and more.
pub struct Social<Db, St, Cp> {
    events: EventReceiver,

    pub auth: Auth<Db>,
    pub catalog: Catalog<Db, St, Cp>,
    pub channels: Channels<Db, St, Cp>,
    pub engagement: Engagement<Db, St, Cp>,
    pub playlists: Playlists<Db, St, Cp>,
    pub streams: Streams<Db, St, Cp>,
}

/// A type passed to various components of the social system, to access
/// state, emit events, and reach the external collaborators.
pub struct SocialContext<Db, St, Cp> {
    pub database: Arc<Db>,
    pub media: Arc<St>,
    pub control_plane: Arc<Cp>,

    pub(crate) emitter: EventSender,
}

impl<Db, St, Cp> Social<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    pub fn new(database: Db, media: St, control_plane: Cp) -> Self {
        let (emitter, events) = unbounded();

        let context = SocialContext {
            database: Arc::new(database),
            media: Arc::new(media),
            control_plane: Arc::new(control_plane),
            emitter,
        };

        Self {
            events,
            auth: Auth::new(&context.database),
            catalog: Catalog::new(&context),
            channels: Channels::new(&context),
            engagement: Engagement::new(&context),
            playlists: Playlists::new(&context),
            streams: Streams::new(&context),
        }
    }

    /// Returns a receiver for the events emitted by the system
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}

impl<Db, St, Cp> SocialContext<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    /// Emits an event to all current receivers
    pub fn emit(&self, event: SocialEvent) {
        let _ = self.emitter.send(event);
    }
}

impl<Db, St, Cp> Clone for SocialContext<Db, St, Cp>
where
    Db: Database,
    St: MediaStorage,
    Cp: StreamControlPlane,
{
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            media: self.media.clone(),
            control_plane: self.control_plane.clone(),
            emitter: self.emitter.clone(),
        }
    }
}
