//! Señal de cancelación cooperativa compartida entre el llamador y los steps.

use std::sync::Arc;

use tokio::sync::watch;

/// Token de cancelación clonable.
///
/// Los steps pueden consultarlo (`is_cancelled`) en puntos de control o
/// esperarlo (`cancelled().await`); el orquestador compite cada operación
/// suspendida contra `cancelled()`.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { state: Arc::new(tx) }
    }

    /// Señala la cancelación. Idempotente.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Se completa cuando el token es cancelado (inmediatamente si ya lo está).
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // El sender vive en `self`, así que `wait_for` sólo retorna al cancelar.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
