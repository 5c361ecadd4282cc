//! Ripple
//!
//! A transactional functional-reactive runtime: behaviours hold values and
//! depend on one another through mapping, applicative application, and
//! monadic join; assigning a variable opens a wave that recomputes every
//! affected behaviour exactly once, in a dependency order discovered on the
//! fly, and fires change events downstream.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple::{BindContext, Wave, map, variable, watch};
//!
//! let ctx = BindContext::forever();
//! let celsius = variable(20.0);
//! let fahrenheit = map(&ctx, |c: &f64| c * 9.0 / 5.0 + 32.0, &celsius.behaviour())?;
//! let _w = watch(&ctx, &fahrenheit, |f| println!("{f} °F"))?;
//!
//! celsius.set(25.0)?; // one wave: recompute, then notify
//!
//! // Batch several writes into a single wave:
//! Wave::group(|wave| celsius.waved_set(30.0, wave))?;
//! ```

pub mod apply;
pub mod behaviour;
pub mod bind;
pub mod error;
pub mod event;
pub mod flatten;
pub mod lifespan;
pub mod map;
pub mod participant;
pub mod proxy;
pub mod session;
pub mod types;
pub mod variable;
pub mod watch;
pub mod wave;

pub use apply::apply;
pub use behaviour::{Behaviour, BehaviourRef, Func, Value, constant};
pub use bind::{BindContext, Participable};
pub use error::{Error, Result};
pub use event::Event;
pub use flatten::join;
pub use lifespan::{Forever, Lifespan, ScopedLifespan, forever};
pub use map::map;
pub use participant::Participant;
pub use proxy::proxy;
pub use session::Session;
pub use types::{NodeState, ParticipantId, WaveId, WavePhase};
pub use variable::{Variable, variable};
pub use watch::{Watch, watch};
pub use wave::Wave;
