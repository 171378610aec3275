use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::{Device, DeviceId, MachineType};
use crate::repository::DeviceRepository;

#[derive(Clone)]
pub struct DeviceProviders {
    pub all_devices: FutureProvider<Vec<Device>>,
    pub connected_devices: Provider<Vec<Device>>,
    pub devices_by_kind: ProviderFamily<MachineType, Vec<Device>>,
    pub device_by_id: FutureProviderFamily<DeviceId, Option<Device>>,
}

impl DeviceProviders {
    pub fn new(repo: Rc<dyn DeviceRepository>) -> Self {
        let all_devices = FutureProvider::new("all_devices", {
            let repo = repo.clone();
            move |_| {
                let repo = repo.clone();
                async move { repo.devices().await.context("loading devices") }
            }
        });

        let connected_devices = Provider::new("connected_devices", {
            let all = all_devices.clone();
            move |r| {
                let mut devices: Vec<Device> = r.watch_async(&all).data_or_default();
                devices.retain(|d| d.connected);
                devices
            }
        });

        let devices_by_kind = ProviderFamily::new("devices_by_kind", {
            let all = all_devices.clone();
            move |r, kind: &MachineType| {
                let mut devices: Vec<Device> = r.watch_async(&all).data_or_default();
                devices.retain(|d| d.kind == *kind);
                devices
            }
        });

        let device_by_id = FutureProviderFamily::new("device_by_id", move |_, id: DeviceId| {
            let repo = repo.clone();
            async move {
                repo.device(id)
                    .await
                    .with_context(|| format!("loading device {id}"))
            }
        });

        Self {
            all_devices,
            connected_devices,
            devices_by_kind,
            device_by_id,
        }
    }
}
