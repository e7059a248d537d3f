mod notify_background_sync;

pub use notify_background_sync::NotifyBackgroundSync;
