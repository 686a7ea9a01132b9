//! UI event loop — the only context that touches the frontend.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::lifecycle::Lifecycle;
use crate::ui::frontend::{Frontend, FrontendRequest};
use crate::ui::sink::{UiCall, UiEvent};

/// Serializes every frontend interaction onto one task.
pub struct UiLoop<F: Frontend> {
    frontend: F,
    events: mpsc::UnboundedReceiver<UiEvent>,
    controller: Arc<Lifecycle>,
}

impl<F: Frontend> UiLoop<F> {
    pub fn new(
        frontend: F,
        events: mpsc::UnboundedReceiver<UiEvent>,
        controller: Arc<Lifecycle>,
    ) -> Self {
        Self {
            frontend,
            events,
            controller,
        }
    }

    /// Run until the frontend quits or closes its request stream.
    pub async fn run(mut self) -> Result<(), Error> {
        let mut requests = self.frontend.start().await?;
        let page = self.controller.page().await;
        self.frontend.load(&page).await?;
        info!(frontend = self.frontend.name(), page = %page.origin, "UI loop started");

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(UiEvent::Call(call)) => self.deliver(call).await,
                    Some(UiEvent::Reload) => self.reload_page().await,
                    None => break,
                },
                request = requests.next() => match request {
                    Some(FrontendRequest::Submit(call)) => self.submit(call).await,
                    Some(FrontendRequest::Quit) | None => break,
                },
            }
        }

        info!(frontend = self.frontend.name(), "UI loop stopped");
        self.frontend.shutdown().await?;
        Ok(())
    }

    async fn deliver(&mut self, call: UiCall) {
        if let Some(origin) = &call.origin
            && origin.generation != self.controller.current_generation().await
        {
            debug!(
                worker = %origin.worker,
                generation = origin.generation,
                call = %call.name,
                "Delivering call from a previous worker generation"
            );
        }
        if let Err(e) = self.frontend.invoke(&call).await {
            warn!(frontend = self.frontend.name(), call = %call.name, "{}", e);
        }
    }

    async fn reload_page(&mut self) {
        let page = self.controller.page().await;
        match self.frontend.load(&page).await {
            Ok(()) => info!(page = %page.origin, "Page reloaded"),
            Err(e) => warn!(page = %page.origin, "Page reload failed: {}", e),
        }
    }

    async fn submit(&mut self, call: Vec<serde_json::Value>) {
        if let Err(e) = self.controller.submit(call).await {
            debug!("Rejected submission: {}", e);
            if let Err(report) = self.frontend.report_error(&e).await {
                warn!(frontend = self.frontend.name(), "{}", report);
            }
        }
    }
}
