//! Credential-and-result coordination for the Drive image picker.
//!
//! This module turns the callback-driven external authorization capability
//! into an awaitable broker, configures the provider-hosted selection
//! surface for embedded and detached hosting, and delivers the user's
//! selection back to the host with at-most-once semantics.
//!
//! External capabilities (authorization client, selection surface, popup
//! host) are injected as traits rather than read from ambient state, so
//! every component is testable with fakes.

pub mod broker;
pub mod channel;
pub mod normalize;
pub mod session;
pub mod surface;

pub use broker::{BrokerConfig, CredentialBroker, PromptMode, TokenClient, TokenGrant, TokenSlot};
pub use channel::{
    CallbackSink, DetachedChannel, DetachedConfig, InboundMessage, PickerMessage, PopupFeatures,
    PopupHost, PopupWindow, ResultSink,
};
pub use normalize::{display_url, normalize, public_content_url};
pub use session::{PickerConfig, PickerSession};
pub use surface::{
    LaunchOptions, RawDoc, SelectionSurface, SurfaceAction, SurfaceConfig, SurfaceHandler,
    SurfaceLauncher, SurfaceView,
};
