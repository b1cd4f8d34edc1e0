//! Startup device identification.
//!
//! Every port is probed once against an ordered list of candidate device
//! categories. The first factory that answers claims the port; a port nobody
//! claims is recorded as `DeviceType::None`. The resulting table is never
//! rebuilt, so devices attached later stay invisible.

use hub_common::consts::PORT_COUNT;
use hub_common::device::{DeviceError, PortDevice};
use hub_common::port::{DeviceEntry, DeviceType, Port};
use tracing::{debug, info, warn};

/// Constructor for one device category on a given port.
///
/// Returns `DeviceError::Absent` when no such device answers there.
pub type DeviceFactory = Box<dyn Fn(Port) -> Result<Box<dyn PortDevice>, DeviceError> + Send>;

/// Candidate device categories in priority order.
///
/// Constructed at startup and handed to [`DeviceRegistry::probe`].
#[derive(Default)]
pub struct ProbeList {
    candidates: Vec<(DeviceType, DeviceFactory)>,
}

impl ProbeList {
    /// Empty list; every port will probe as `None`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate (lowest priority so far).
    pub fn register(&mut self, device_type: DeviceType, factory: DeviceFactory) {
        debug!("Probe candidate #{}: {:?}", self.candidates.len(), device_type);
        self.candidates.push((device_type, factory));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, device_type: DeviceType, factory: DeviceFactory) -> Self {
        self.register(device_type, factory);
        self
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true when no candidates are registered.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Port → device-type table plus the live device handles behind it.
pub struct DeviceRegistry {
    entries: [DeviceEntry; PORT_COUNT],
    devices: [Option<Box<dyn PortDevice>>; PORT_COUNT],
}

impl DeviceRegistry {
    /// Probe `ports` against `candidates`.
    ///
    /// Ports in `Port::ALL` that are not in `ports` (absent on this hub model)
    /// get a `None` entry without probing, so the table always covers all six.
    pub fn probe(ports: &[Port], candidates: &ProbeList) -> Self {
        let mut entries = Port::ALL.map(|port| DeviceEntry {
            port,
            device_type: DeviceType::None,
        });
        let mut devices: [Option<Box<dyn PortDevice>>; PORT_COUNT] = std::array::from_fn(|_| None);

        for (index, entry) in entries.iter_mut().enumerate() {
            let port = entry.port;
            if ports.contains(&port) {
                for (candidate, factory) in &candidates.candidates {
                    match factory(port) {
                        Ok(device) => {
                            entry.device_type = *candidate;
                            devices[index] = Some(device);
                            break;
                        }
                        Err(DeviceError::Absent { .. }) => {}
                        Err(e) => {
                            warn!("Probe of {:?} on port {} failed: {}", candidate, port, e);
                        }
                    }
                }
            }
            info!("Port {}: {:?}", port, entry.device_type);
        }

        Self { entries, devices }
    }

    /// One entry per port, in port order.
    pub fn entries(&self) -> &[DeviceEntry] {
        &self.entries
    }

    /// Device type on `port`.
    pub fn device_type(&self, port: Port) -> DeviceType {
        self.entries[port.index() as usize].device_type
    }

    /// Device types in port order, as carried by the 0x10 record.
    pub fn device_types(&self) -> [DeviceType; PORT_COUNT] {
        self.entries.map(|e| e.device_type)
    }

    /// Live handle for the device on `port`.
    pub fn device_mut(&mut self, port: Port) -> Option<&mut (dyn PortDevice + 'static)> {
        self.devices[port.index() as usize].as_deref_mut()
    }

    /// Ports holding a device of `device_type`, in port order.
    pub fn ports_with(&self, device_type: DeviceType) -> impl Iterator<Item = Port> + '_ {
        self.entries
            .iter()
            .filter(move |e| e.device_type == device_type)
            .map(|e| e.port)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_common::device::{DeviceCommand, DeviceState, MotorState};

    struct Dummy {
        port: Port,
        device_type: DeviceType,
    }

    impl PortDevice for Dummy {
        fn device_type(&self) -> DeviceType {
            self.device_type
        }
        fn port(&self) -> Port {
            self.port
        }
        fn query_state(&mut self) -> Result<DeviceState, DeviceError> {
            Ok(DeviceState::Motor(MotorState::default()))
        }
        fn apply_command(&mut self, _: DeviceCommand) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn factory_on(device_type: DeviceType, present: &'static [Port]) -> DeviceFactory {
        Box::new(move |port: Port| -> Result<Box<dyn PortDevice>, DeviceError> {
            if present.contains(&port) {
                Ok(Box::new(Dummy { port, device_type }))
            } else {
                Err(DeviceError::Absent { port })
            }
        })
    }

    #[test]
    fn exactly_one_entry_per_port() {
        let list = ProbeList::new()
            .with(DeviceType::Motor, factory_on(DeviceType::Motor, &[Port::A]))
            .with(
                DeviceType::ColorDistanceSensor,
                factory_on(DeviceType::ColorDistanceSensor, &[Port::C]),
            );
        let registry = DeviceRegistry::probe(&Port::ALL, &list);

        assert_eq!(registry.entries().len(), PORT_COUNT);
        for (entry, port) in registry.entries().iter().zip(Port::ALL) {
            assert_eq!(entry.port, port);
        }
        assert_eq!(
            registry.device_types(),
            [
                DeviceType::Motor,
                DeviceType::None,
                DeviceType::ColorDistanceSensor,
                DeviceType::None,
                DeviceType::None,
                DeviceType::None,
            ]
        );
    }

    #[test]
    fn first_candidate_wins() {
        let list = ProbeList::new()
            .with(DeviceType::Motor, factory_on(DeviceType::Motor, &[Port::B]))
            .with(
                DeviceType::ColorDistanceSensor,
                factory_on(DeviceType::ColorDistanceSensor, &[Port::B]),
            );
        let mut registry = DeviceRegistry::probe(&Port::ALL, &list);
        assert_eq!(registry.device_type(Port::B), DeviceType::Motor);
        assert_eq!(
            registry.device_mut(Port::B).map(|d| d.device_type()),
            Some(DeviceType::Motor)
        );
    }

    #[test]
    fn failing_factory_falls_through() {
        let broken: DeviceFactory = Box::new(|port: Port| -> Result<Box<dyn PortDevice>, DeviceError> {
            Err(DeviceError::failed(port, "bus timeout"))
        });
        let list = ProbeList::new().with(DeviceType::Motor, broken).with(
            DeviceType::ColorDistanceSensor,
            factory_on(DeviceType::ColorDistanceSensor, &[Port::A]),
        );
        let registry = DeviceRegistry::probe(&Port::ALL, &list);
        assert_eq!(registry.device_type(Port::A), DeviceType::ColorDistanceSensor);
    }

    #[test]
    fn ports_missing_on_hub_are_none() {
        let list = ProbeList::new().with(DeviceType::Motor, factory_on(DeviceType::Motor, &Port::ALL));
        let mut registry = DeviceRegistry::probe(&Port::ALL[..4], &list);
        assert_eq!(registry.ports_with(DeviceType::Motor).count(), 4);
        assert_eq!(registry.device_type(Port::E), DeviceType::None);
        assert!(registry.device_mut(Port::F).is_none());
    }

    #[test]
    fn entry_index_matches_port_index() {
        let list = ProbeList::new().with(DeviceType::Motor, factory_on(DeviceType::Motor, &[Port::D]));
        let registry = DeviceRegistry::probe(&Port::ALL[..4], &list);
        for port in Port::ALL {
            let entry = registry.entries()[port.index() as usize];
            assert_eq!(entry.port, port);
            assert_eq!(entry.device_type, registry.device_type(port));
        }
        assert_eq!(registry.device_type(Port::D), DeviceType::Motor);
    }

    #[test]
    fn empty_probe_list_yields_none_everywhere() {
        let registry = DeviceRegistry::probe(&Port::ALL, &ProbeList::new());
        assert!(registry.entries().iter().all(|e| !e.device_type.is_present()));
    }
}
