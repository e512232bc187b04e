//! Radio discovery source.
//!
//! The scan cycle consumes discovery through the [`RadioSource`] port, so
//! the pipeline runs identically over real BlueZ hardware ([`BleRadio`],
//! behind the default `bluetooth` feature) and over scripted sightings
//! ([`MockRadio`], for tests and for hosts without a Bluetooth stack).

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::types::DeviceSighting;

#[cfg(feature = "bluetooth")]
use crate::error::LanyardError;

/// Source of periodic device-discovery passes.
///
/// Implementations own scanning cadence and hardware access; the pipeline
/// only asks for "everything visible within this bounded timeout".
pub trait RadioSource: Send {
    /// Run one discovery pass, returning every device observed before the
    /// timeout elapses. A timeout with no sightings is an empty vec, not an
    /// error.
    fn discover(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<DeviceSighting>>> + Send;
}

/// BLE discovery over BlueZ.
#[cfg(feature = "bluetooth")]
pub struct BleRadio {
    adapter: bluer::Adapter,
}

#[cfg(feature = "bluetooth")]
impl BleRadio {
    /// Connect to the default Bluetooth adapter and power it on.
    ///
    /// # Errors
    ///
    /// [`LanyardError::AdapterNotFound`] when no adapter is present,
    /// [`LanyardError::DiscoveryFailed`] when the session cannot be
    /// established or the adapter cannot be powered.
    pub async fn new() -> Result<Self> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| LanyardError::DiscoveryFailed(e.to_string()))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| LanyardError::AdapterNotFound)?;
        adapter
            .set_powered(true)
            .await
            .map_err(|e| LanyardError::DiscoveryFailed(e.to_string()))?;
        Ok(Self { adapter })
    }
}

#[cfg(feature = "bluetooth")]
impl RadioSource for BleRadio {
    async fn discover(&mut self, timeout: Duration) -> Result<Vec<DeviceSighting>> {
        use bluer::AdapterEvent;
        use futures::StreamExt;

        let events = self
            .adapter
            .discover_devices()
            .await
            .map_err(|e| LanyardError::DiscoveryFailed(e.to_string()))?;
        futures::pin_mut!(events);

        let deadline = tokio::time::Instant::now() + timeout;
        let mut sightings = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, events.next()).await {
                // deadline reached or discovery stream ended
                Err(_) | Ok(None) => break,
                Ok(Some(AdapterEvent::DeviceAdded(addr))) => {
                    let Ok(device) = self.adapter.device(addr) else {
                        continue;
                    };
                    let name = device.name().await.ok().flatten();
                    let rssi = device.rssi().await.ok().flatten();
                    sightings.push(DeviceSighting {
                        address: addr.to_string(),
                        name,
                        rssi,
                    });
                }
                Ok(Some(_)) => {}
            }
        }

        Ok(sightings)
    }
}

/// Scripted radio: each discovery pass pops the next queued batch.
#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
#[derive(Debug, Default)]
pub struct MockRadio {
    batches: std::collections::VecDeque<Vec<DeviceSighting>>,
}

#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
impl MockRadio {
    /// Radio that never sees anything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Radio that replays the given batches, one per discovery pass, then
    /// reports empty passes.
    #[must_use]
    pub fn with_batches(batches: Vec<Vec<DeviceSighting>>) -> Self {
        Self {
            batches: batches.into(),
        }
    }

    /// Queue one more discovery result.
    pub fn push_batch(&mut self, batch: Vec<DeviceSighting>) {
        self.batches.push_back(batch);
    }
}

#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
impl RadioSource for MockRadio {
    async fn discover(&mut self, _timeout: Duration) -> Result<Vec<DeviceSighting>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sighting(address: &str, name: Option<&str>) -> DeviceSighting {
        DeviceSighting {
            address: address.into(),
            name: name.map(Into::into),
            rssi: Some(-60),
        }
    }

    #[tokio::test]
    async fn mock_radio_replays_batches_in_order() {
        let mut radio = MockRadio::with_batches(vec![
            vec![sighting("AA:00", Some("ATT-1"))],
            vec![sighting("AA:01", None), sighting("AA:02", None)],
        ]);

        let first = radio.discover(Duration::from_secs(5)).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = radio.discover(Duration::from_secs(5)).await.unwrap();
        assert_eq!(second.len(), 2);
        let third = radio.discover(Duration::from_secs(5)).await.unwrap();
        assert!(third.is_empty());
    }
}
