//! Device admission control.
//!
//! Model stages take a permit for the device they run on before loading a
//! model, bounding how many pipelines do inference at once. Slots live in
//! a prefilled bounded crossbeam channel, so acquiring blocks without
//! spinning and releasing is a plain send.

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::config::{Device, DeviceConfig};

/// A bounded pool of inference slots per device.
#[derive(Debug, Clone)]
pub struct DevicePool {
    cpu: Lane,
    cuda: Lane,
}

#[derive(Debug, Clone)]
struct Lane {
    slots: Sender<()>,
    free: Receiver<()>,
}

impl Lane {
    fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (slots, free) = bounded(capacity);
        for _ in 0..capacity {
            // Filling to capacity cannot block
            slots.send(()).ok();
        }
        Self { slots, free }
    }
}

impl DevicePool {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            cpu: Lane::with_capacity(config.cpu_slots),
            cuda: Lane::with_capacity(config.cuda_slots),
        }
    }

    /// Block until a slot for `device` frees up.
    pub fn acquire(&self, device: Device) -> DevicePermit {
        let lane = self.lane(device);
        // Cannot fail: the pool itself keeps a sender alive
        lane.free.recv().ok();
        DevicePermit {
            slot: lane.slots.clone(),
            device,
        }
    }

    /// Take a slot if one is free right now.
    pub fn try_acquire(&self, device: Device) -> Option<DevicePermit> {
        let lane = self.lane(device);
        lane.free.try_recv().ok().map(|()| DevicePermit {
            slot: lane.slots.clone(),
            device,
        })
    }

    /// Free slots for `device` at this instant.
    pub fn available(&self, device: Device) -> usize {
        self.lane(device).free.len()
    }

    fn lane(&self, device: Device) -> &Lane {
        match device {
            Device::Cpu => &self.cpu,
            Device::Cuda => &self.cuda,
        }
    }
}

impl Default for DevicePool {
    fn default() -> Self {
        Self::new(&DeviceConfig::default())
    }
}

/// Held while a model stage owns a device slot; dropping it frees the slot.
#[derive(Debug)]
pub struct DevicePermit {
    slot: Sender<()>,
    device: Device,
}

impl DevicePermit {
    pub fn device(&self) -> Device {
        self.device
    }
}

impl Drop for DevicePermit {
    fn drop(&mut self) {
        // Returning the slot we hold cannot exceed channel capacity
        self.slot.try_send(()).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn pool(cpu_slots: usize, cuda_slots: usize) -> DevicePool {
        DevicePool::new(&DeviceConfig {
            cpu_slots,
            cuda_slots,
        })
    }

    #[test]
    fn acquire_and_drop_cycles_a_slot() {
        let pool = pool(1, 1);

        assert_eq!(pool.available(Device::Cpu), 1);
        let permit = pool.acquire(Device::Cpu);
        assert_eq!(permit.device(), Device::Cpu);
        assert_eq!(pool.available(Device::Cpu), 0);

        drop(permit);
        assert_eq!(pool.available(Device::Cpu), 1);
    }

    #[test]
    fn try_acquire_fails_when_exhausted() {
        let pool = pool(1, 1);

        let _held = pool.acquire(Device::Cpu);
        assert!(pool.try_acquire(Device::Cpu).is_none());
        assert!(pool.try_acquire(Device::Cuda).is_some());
    }

    #[test]
    fn devices_have_independent_lanes() {
        let pool = pool(1, 2);

        let _cpu = pool.acquire(Device::Cpu);
        assert_eq!(pool.available(Device::Cpu), 0);
        assert_eq!(pool.available(Device::Cuda), 2);
    }

    #[test]
    fn zero_slot_config_still_grants_one() {
        let pool = pool(0, 0);
        assert_eq!(pool.available(Device::Cpu), 1);
    }

    #[test]
    fn acquire_blocks_until_a_permit_returns() {
        let pool = Arc::new(pool(1, 1));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = Arc::clone(&pool);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(thread::spawn(move || {
                let _permit = pool.acquire(Device::Cpu);
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // One slot means the stages never overlapped
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(pool.available(Device::Cpu), 1);
    }
}
