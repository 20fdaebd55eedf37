//! # Debugger Session
//!
//! Wires one backend into one object model:
//!
//! ```text
//!  BackendDriver ──DriverEvent──▶ pump task ──▶ BackendAdapter ──ModelEvent──▶ ModelWriter
//!        ▲                                                                         │
//!        └────────────── CommandProtocol ◀── ObjectModel ◀─────────────────────────┘
//! ```
//!
//! The pump is the model's only writer, so events from one driver are applied
//! in the order the driver sent them. When the driver drops its event sender
//! the pump closes the model: pending waits fail with `ObjectGone`.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::backends::{event_channel, AdapterContext, BackendAdapter, BackendDriver, BackendKind, DriverEventReceiver};
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::model::{ModelWriter, ObjectModel};
use crate::protocol::CommandProtocol;

/// A connected backend and the model that mirrors it.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct DebuggerSession
{
    kind: BackendKind,
    model: ObjectModel,
    protocol: CommandProtocol,
    shutdown: CancellationToken,
    pump: JoinHandle<()>,
}

impl DebuggerSession
{
    /// Connect `driver` and start mirroring it.
    ///
    /// The adapter's seed objects (launcher, environment, collections) are in
    /// the model when this returns.
    ///
    /// ## Errors
    ///
    /// Whatever [`BackendDriver::connect`] reports.
    pub fn connect(
        mut adapter: Box<dyn BackendAdapter>,
        driver: Arc<dyn BackendDriver>,
        config: ModelConfig,
    ) -> ModelResult<Self>
    {
        let kind = adapter.kind();
        let (tx, rx) = event_channel();
        driver.connect(tx)?;

        let (model, mut writer) = ObjectModel::new(config);
        let context = AdapterContext {
            driver: driver.clone(),
            breakpoints: model.breakpoints().clone(),
        };
        for event in adapter.seed(&context) {
            writer.apply(event);
        }
        info!(%kind, driver = driver.name(), objects = model.len(), "session connected");

        let shutdown = CancellationToken::new();
        let pump = tokio::spawn(pump(adapter, context, writer, rx, shutdown.clone()));
        Ok(Self {
            kind,
            protocol: CommandProtocol::new(model.clone()),
            model,
            shutdown,
            pump,
        })
    }

    /// Connect with the adapter for `kind`.
    ///
    /// ## Errors
    ///
    /// See [`DebuggerSession::connect`].
    pub fn open(kind: BackendKind, driver: Arc<dyn BackendDriver>, config: ModelConfig) -> ModelResult<Self>
    {
        Self::connect(kind.adapter(), driver, config)
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind
    {
        self.kind
    }

    #[must_use]
    pub fn model(&self) -> &ObjectModel
    {
        &self.model
    }

    #[must_use]
    pub fn protocol(&self) -> &CommandProtocol
    {
        &self.protocol
    }

    /// Stop the pump and close the model.
    ///
    /// ## Errors
    ///
    /// `Disconnected` if the pump task panicked.
    pub async fn disconnect(self) -> ModelResult<()>
    {
        self.shutdown.cancel();
        self.pump.await.map_err(|err| {
            warn!(error = %err, "session pump ended abnormally");
            ModelError::Disconnected
        })
    }
}

async fn pump(
    mut adapter: Box<dyn BackendAdapter>,
    context: AdapterContext,
    mut writer: ModelWriter,
    mut rx: DriverEventReceiver,
    shutdown: CancellationToken,
)
{
    loop {
        let event = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                debug!("session shutdown requested");
                break;
            }
            event = rx.recv() => event,
        };
        let Some(event) = event else {
            warn!(driver = context.driver.name(), "driver event channel closed");
            break;
        };
        trace!(event = %event.describe(), "driver event");
        for model_event in adapter.translate(event, &context) {
            writer.apply(model_event);
        }
    }
    writer.close();
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::backends::loopback::LoopbackDriver;
    use crate::types::TargetPath;

    #[tokio::test]
    async fn test_seed_is_visible_after_connect()
    {
        let driver = Arc::new(LoopbackDriver::new());
        let session = DebuggerSession::open(BackendKind::Lldb, driver, ModelConfig::default()).unwrap();
        let launcher = TargetPath::parse("Sessions[0]").unwrap();
        assert!(session.model().get(&launcher).is_some());
        assert_eq!(session.kind(), BackendKind::Lldb);
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_driver_disconnect_closes_model()
    {
        let driver = Arc::new(LoopbackDriver::new());
        let session = DebuggerSession::open(BackendKind::Gdb, driver.clone(), ModelConfig::default()).unwrap();
        let pending = session.model().wait_for_object(&TargetPath::parse("Inferiors[1]").unwrap());

        driver.disconnect();
        assert!(matches!(pending.await, Err(ModelError::ObjectGone(_))));
        assert!(session.model().is_closed());
    }

    #[tokio::test]
    async fn test_second_connect_is_rejected()
    {
        let driver = Arc::new(LoopbackDriver::new());
        let _session = DebuggerSession::open(BackendKind::Frida, driver.clone(), ModelConfig::default()).unwrap();
        assert!(DebuggerSession::open(BackendKind::Frida, driver, ModelConfig::default()).is_err());
    }
}
