use std::{
    any::Any,
    fmt,
    future::Future,
    ops::{Deref, DerefMut},
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::{JoinError, JoinHandle};

/// A wrapper around `tokio::task::JoinHandle` that aborts the task when dropped, while still
/// allowing access to the handle.
///
/// Dropping calls `abort()`, which does **not** run any cleanup inside the task. Tasks held
/// through this handle must tolerate abrupt cancellation.
#[derive(Debug)]
pub(crate) struct AbortOnDropHandle<T>(JoinHandle<T>);

impl<T> From<JoinHandle<T>> for AbortOnDropHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }
}

impl<T> Deref for AbortOnDropHandle<T> {
    type Target = JoinHandle<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for AbortOnDropHandle<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T> Future for AbortOnDropHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDropHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Message extracted from a caught panic.
#[derive(Debug, Clone)]
pub struct PanicPayload(String);

impl From<Box<dyn Any + Send>> for PanicPayload {
    fn from(value: Box<dyn Any + Send>) -> Self {
        let panic_msg = if let Some(s) = value.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = value.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic payload".to_string()
        };

        Self(panic_msg)
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use tokio::time::{self, Duration};

    use super::*;

    #[test]
    fn panic_payload_from_str_and_string() {
        let caught = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(PanicPayload::from(caught).to_string(), "static message");

        let caught = panic::catch_unwind(|| panic!("formatted {}", 42)).unwrap_err();
        assert_eq!(PanicPayload::from(caught).to_string(), "formatted 42");
    }

    #[tokio::test]
    async fn abort_on_drop_cancels_task() {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

        let handle: AbortOnDropHandle<()> = tokio::spawn(async move {
            let _tx = tx;
            time::sleep(Duration::from_secs(60)).await;
        })
        .into();

        drop(handle);

        // The sender is dropped once the aborted task is torn down
        let res = time::timeout(Duration::from_secs(1), rx.recv()).await;
        assert_eq!(res, Ok(None));
    }
}
