use tokio::sync::watch;

/// Resolves once shutdown has been raised, or once the signal's owner is gone.
pub async fn requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

pub fn is_raised(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}
