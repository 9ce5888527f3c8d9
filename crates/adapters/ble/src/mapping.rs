//! Conversions between btleplug types and the port types.

use btleplug::api::{BDAddr, CharPropFlags, Characteristic, Service, WriteType};

use shutterlink_app::ports::{CharacteristicProperties, GattCharacteristic, GattService};
use shutterlink_domain::camera::CameraAddress;
use shutterlink_domain::error::ValidationError;
use shutterlink_domain::protocol::WriteKind;

pub(crate) fn write_type(kind: WriteKind) -> WriteType {
    match kind {
        WriteKind::WithResponse => WriteType::WithResponse,
        WriteKind::WithoutResponse => WriteType::WithoutResponse,
    }
}

pub(crate) fn properties(flags: CharPropFlags) -> CharacteristicProperties {
    CharacteristicProperties {
        read: flags.contains(CharPropFlags::READ),
        write: flags.contains(CharPropFlags::WRITE),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
    }
}

pub(crate) fn characteristic(c: &Characteristic) -> GattCharacteristic {
    GattCharacteristic {
        uuid: c.uuid,
        service_uuid: c.service_uuid,
        properties: properties(c.properties),
    }
}

pub(crate) fn service(s: &Service) -> GattService {
    GattService {
        uuid: s.uuid,
        characteristics: s.characteristics.iter().map(characteristic).collect(),
    }
}

pub(crate) fn address(addr: BDAddr) -> Result<CameraAddress, ValidationError> {
    CameraAddress::parse(&addr.to_string())
}
