//! UI dispatch sink — marshals named calls onto the UI event loop.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::UiError;
use crate::tasks::task::call_name;

/// Which worker, in which pool generation, produced a UI call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOrigin {
    pub worker: String,
    pub generation: u64,
}

/// A call of a page-level function, by name.
#[derive(Debug, Clone, PartialEq)]
pub struct UiCall {
    pub name: String,
    pub args: Vec<Value>,
    /// `None` for calls made outside a worker.
    pub origin: Option<CallOrigin>,
}

/// Work for the UI event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Call(UiCall),
    /// Reload the page from the current resources.
    Reload,
}

/// Sending half of the UI channel. Cheap to clone; shared by every worker.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::UnboundedSender<UiEvent>,
    origin: Option<CallOrigin>,
}

impl UiSink {
    /// Create a sink and the receiver the UI event loop drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, origin: None }, rx)
    }

    /// A sink whose calls are stamped with the given worker origin.
    pub fn for_worker(&self, worker: impl Into<String>, generation: u64) -> Self {
        Self {
            tx: self.tx.clone(),
            origin: Some(CallOrigin {
                worker: worker.into(),
                generation,
            }),
        }
    }

    pub fn origin(&self) -> Option<&CallOrigin> {
        self.origin.as_ref()
    }

    /// Queue a call of `name(args...)` on the UI. Does not wait for it to run.
    pub fn send(&self, name: &str, args: Vec<Value>) -> Result<(), UiError> {
        if name.is_empty() {
            return Err(UiError::MissingName);
        }
        let call = UiCall {
            name: name.to_string(),
            args,
            origin: self.origin.clone(),
        };
        self.tx
            .send(UiEvent::Call(call))
            .map_err(|_| UiError::Closed)
    }

    /// Variadic form: `[name, arg1, arg2, ...]`.
    pub fn send_call(&self, call: Vec<Value>) -> Result<(), UiError> {
        let mut parts = call.into_iter();
        let name = parts.next().ok_or(UiError::MissingName)?;
        self.send(&call_name(&name), parts.collect())
    }

    /// Ask the UI to reload its page.
    pub fn request_reload(&self) -> Result<(), UiError> {
        self.tx.send(UiEvent::Reload).map_err(|_| UiError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_delivers_name_and_args() {
        let (sink, mut rx) = UiSink::channel();
        sink.send("workDone", vec![json!("ok"), json!(5), json!("worker-2")])
            .unwrap();

        match rx.recv().await.unwrap() {
            UiEvent::Call(call) => {
                assert_eq!(call.name, "workDone");
                assert_eq!(call.args, vec![json!("ok"), json!(5), json!("worker-2")]);
                assert!(call.origin.is_none());
            }
            other => panic!("Expected Call, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let (sink, mut rx) = UiSink::channel();
        assert!(matches!(sink.send("", vec![]), Err(UiError::MissingName)));
        assert!(matches!(sink.send_call(vec![]), Err(UiError::MissingName)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn worker_sink_stamps_origin() {
        let (sink, mut rx) = UiSink::channel();
        let worker = sink.for_worker("worker-pool-1", 7);
        worker.send_call(vec![json!("done"), json!(1)]).unwrap();

        let UiEvent::Call(call) = rx.recv().await.unwrap() else {
            panic!("Expected Call");
        };
        assert_eq!(call.name, "done");
        assert_eq!(
            call.origin,
            Some(CallOrigin {
                worker: "worker-pool-1".to_string(),
                generation: 7
            })
        );
    }

    #[tokio::test]
    async fn per_sender_order_is_preserved() {
        let (sink, mut rx) = UiSink::channel();
        for i in 0..10 {
            sink.send("tick", vec![json!(i)]).unwrap();
        }
        for i in 0..10 {
            let UiEvent::Call(call) = rx.recv().await.unwrap() else {
                panic!("Expected Call");
            };
            assert_eq!(call.args, vec![json!(i)]);
        }
    }

    #[test]
    fn closed_loop_is_reported() {
        let (sink, rx) = UiSink::channel();
        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(sink.send("x", vec![]), Err(UiError::Closed)));
        assert!(matches!(sink.request_reload(), Err(UiError::Closed)));
    }
}
