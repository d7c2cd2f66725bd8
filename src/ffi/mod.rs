//! C ABI Facade
//!
//! A thin `extern "C"` layer over [`Manager`] for firmware and host
//! applications written in C. The facade owns no logic: it validates
//! pointers, converts between the C structs and the crate types, stores
//! callback pointer/context pairs and trampolines them into the safe core.
//!
//! # Handle contract
//!
//! `xslot_init` returns an opaque handle that is a boxed [`Manager`];
//! `xslot_deinit` destroys it. The caller upholds the usual C lifetime
//! rules: no call may use a handle after `xslot_deinit`, and the handle
//! must not be destroyed while another thread is inside an API call.
//!
//! # Callbacks
//!
//! Each callback is registered as a function pointer plus an opaque
//! context pointer. Callbacks fire on the stack's background threads; the
//! context must therefore be safe to touch from another thread.

#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_char, c_int, c_void};

use crate::at::PowerMode;
use crate::error::{strerror, Result, XSlotError};
use crate::manager::{Config, Manager, RunMode};
use crate::object::{BacnetObject, ObjectType, ObjectValue, RAW_VALUE_SIZE};

/// Success code of the C surface.
pub const XSLOT_OK: c_int = 0;

/// Present value union of the C object struct.
#[repr(C)]
#[derive(Clone, Copy)]
pub union XslotValue {
    /// Analog value for AI/AO/AV.
    pub analog: f32,
    /// Binary value for BI/BO/BV.
    pub binary: u8,
    /// Raw bytes for custom types.
    pub raw: [u8; RAW_VALUE_SIZE],
}

/// BACnet object as seen by C callers.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XslotObject {
    /// Object instance number.
    pub object_id: u16,
    /// Object type byte.
    pub object_type: u8,
    /// Status flags.
    pub flags: u8,
    /// Present value, discriminated by `object_type`.
    pub value: XslotValue,
}

/// Node table entry as seen by C callers.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XslotNodeInfo {
    /// Node address.
    pub addr: u16,
    /// Last-seen timestamp in milliseconds.
    pub last_seen_ms: u64,
    /// Signal strength in dBm.
    pub rssi: i8,
    /// Online state.
    pub online: bool,
    /// Object count, when known.
    pub object_count: u8,
}

/// Stack configuration as seen by C callers.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct XslotConfig {
    /// Local node address.
    pub local_addr: u16,
    /// Mesh cell id.
    pub cell_id: u8,
    /// Transmit power in dBm.
    pub power_dbm: i8,
    /// UART baud rate; 0 selects the 115200 default.
    pub uart_baudrate: u32,
    /// Heartbeat cadence in milliseconds; 0 selects the default.
    pub heartbeat_interval_ms: u32,
    /// Offline sweep threshold in milliseconds; 0 selects the default.
    pub heartbeat_timeout_ms: u32,
    /// Modem power mode: 2 low power, 3 normal.
    pub power_mode: u8,
    /// NUL-terminated UART device name.
    pub uart_port: [c_char; 64],
}

/// Raw data callback: Query and Response payloads.
pub type XslotDataCallback =
    Option<unsafe extern "C" fn(ctx: *mut c_void, from: u16, data: *const u8, len: u8)>;

/// Node online/offline callback.
pub type XslotNodeCallback =
    Option<unsafe extern "C" fn(ctx: *mut c_void, addr: u16, online: bool)>;

/// Write-request callback.
pub type XslotWriteCallback =
    Option<unsafe extern "C" fn(ctx: *mut c_void, from: u16, obj: *const XslotObject)>;

/// Telemetry callback.
pub type XslotReportCallback = Option<
    unsafe extern "C" fn(ctx: *mut c_void, from: u16, objects: *const XslotObject, count: u8),
>;

/// Context pointer captured into a callback closure.
///
/// The C caller guarantees the pointee is usable from the stack's
/// background threads for as long as the callback stays registered.
#[derive(Clone, Copy)]
struct CallbackCtx(*mut c_void);

unsafe impl Send for CallbackCtx {}

fn to_code(result: Result<()>) -> c_int {
    match result {
        Ok(()) => XSLOT_OK,
        Err(e) => e.code(),
    }
}

fn manager_ref<'a>(handle: *mut c_void) -> Option<&'a Manager> {
    if handle.is_null() {
        None
    } else {
        Some(unsafe { &*(handle as *const Manager) })
    }
}

impl XslotObject {
    fn to_object(&self) -> BacnetObject {
        let object_type = ObjectType::from_u8(self.object_type);
        let value = unsafe {
            if object_type.is_analog() {
                ObjectValue::Analog(self.value.analog)
            } else if object_type.is_binary() {
                ObjectValue::Binary(self.value.binary)
            } else {
                ObjectValue::Raw(self.value.raw)
            }
        };

        BacnetObject {
            object_id: self.object_id,
            object_type,
            flags: self.flags,
            value,
        }
    }

    fn from_object(obj: &BacnetObject) -> Self {
        let value = match obj.value {
            ObjectValue::Analog(analog) => XslotValue { analog },
            ObjectValue::Binary(binary) => XslotValue { binary },
            ObjectValue::Raw(raw) => XslotValue { raw },
        };

        Self {
            object_id: obj.object_id,
            object_type: obj.object_type.as_u8(),
            flags: obj.flags,
            value,
        }
    }
}

impl XslotConfig {
    fn to_config(&self) -> Config {
        let defaults = Config::default();

        let port_bytes: Vec<u8> = self
            .uart_port
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();

        Config {
            local_addr: self.local_addr,
            cell_id: self.cell_id,
            power_dbm: self.power_dbm,
            uart_port: String::from_utf8_lossy(&port_bytes).into_owned(),
            uart_baudrate: if self.uart_baudrate != 0 {
                self.uart_baudrate
            } else {
                defaults.uart_baudrate
            },
            heartbeat_interval_ms: if self.heartbeat_interval_ms != 0 {
                self.heartbeat_interval_ms
            } else {
                defaults.heartbeat_interval_ms
            },
            heartbeat_timeout_ms: if self.heartbeat_timeout_ms != 0 {
                self.heartbeat_timeout_ms
            } else {
                defaults.heartbeat_timeout_ms
            },
            power_mode: PowerMode::from_u8(self.power_mode).unwrap_or(defaults.power_mode),
        }
    }
}

/// Create a stack instance. Returns a handle, or NULL on bad input.
///
/// # Safety
///
/// `config` must point to a valid [`XslotConfig`].
#[no_mangle]
pub unsafe extern "C" fn xslot_init(config: *const XslotConfig) -> *mut c_void {
    if config.is_null() {
        return std::ptr::null_mut();
    }

    let manager = Manager::new((*config).to_config());
    Box::into_raw(Box::new(manager)) as *mut c_void
}

/// Destroy a stack instance, stopping it first.
#[no_mangle]
pub unsafe extern "C" fn xslot_deinit(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut Manager));
    }
}

/// Detect hardware and start the stack.
#[no_mangle]
pub unsafe extern "C" fn xslot_start(handle: *mut c_void) -> c_int {
    match manager_ref(handle) {
        Some(manager) => to_code(manager.start()),
        None => XSlotError::InvalidParam.code(),
    }
}

/// Stop the stack.
#[no_mangle]
pub unsafe extern "C" fn xslot_stop(handle: *mut c_void) {
    if let Some(manager) = manager_ref(handle) {
        manager.stop();
    }
}

/// Detected run mode: 0 none, 1 wireless, 2 HMI.
#[no_mangle]
pub unsafe extern "C" fn xslot_get_run_mode(handle: *mut c_void) -> c_int {
    match manager_ref(handle) {
        Some(manager) => manager.run_mode() as c_int,
        None => RunMode::None as c_int,
    }
}

/// Report objects to the hub.
#[no_mangle]
pub unsafe extern "C" fn xslot_report_objects(
    handle: *mut c_void,
    objects: *const XslotObject,
    count: u8,
) -> c_int {
    let manager = match manager_ref(handle) {
        Some(manager) => manager,
        None => return XSlotError::InvalidParam.code(),
    };
    if objects.is_null() || count == 0 {
        return XSlotError::InvalidParam.code();
    }

    let objects: Vec<BacnetObject> = std::slice::from_raw_parts(objects, count as usize)
        .iter()
        .map(XslotObject::to_object)
        .collect();
    to_code(manager.report(&objects))
}

/// Write one object on a remote node.
#[no_mangle]
pub unsafe extern "C" fn xslot_write_object(
    handle: *mut c_void,
    target: u16,
    obj: *const XslotObject,
) -> c_int {
    let manager = match manager_ref(handle) {
        Some(manager) => manager,
        None => return XSlotError::InvalidParam.code(),
    };
    if obj.is_null() {
        return XSlotError::InvalidParam.code();
    }

    to_code(manager.write(target, &(*obj).to_object()))
}

/// Query objects on a remote node.
#[no_mangle]
pub unsafe extern "C" fn xslot_query_objects(
    handle: *mut c_void,
    target: u16,
    object_ids: *const u16,
    count: u8,
) -> c_int {
    let manager = match manager_ref(handle) {
        Some(manager) => manager,
        None => return XSlotError::InvalidParam.code(),
    };
    if object_ids.is_null() || count == 0 {
        return XSlotError::InvalidParam.code();
    }

    let ids = std::slice::from_raw_parts(object_ids, count as usize);
    to_code(manager.query(target, ids))
}

/// Send a heartbeat ping.
#[no_mangle]
pub unsafe extern "C" fn xslot_send_ping(handle: *mut c_void, target: u16) -> c_int {
    match manager_ref(handle) {
        Some(manager) => to_code(manager.ping(target)),
        None => XSlotError::InvalidParam.code(),
    }
}

/// Copy up to `max_count` node entries into `nodes`; returns the count
/// written, or a negative error code.
#[no_mangle]
pub unsafe extern "C" fn xslot_get_nodes(
    handle: *mut c_void,
    nodes: *mut XslotNodeInfo,
    max_count: c_int,
) -> c_int {
    let manager = match manager_ref(handle) {
        Some(manager) => manager,
        None => return XSlotError::InvalidParam.code(),
    };
    if nodes.is_null() || max_count <= 0 {
        return XSlotError::InvalidParam.code();
    }

    let out = std::slice::from_raw_parts_mut(nodes, max_count as usize);
    let mut written = 0;
    for info in manager.get_nodes().into_iter().take(out.len()) {
        out[written] = XslotNodeInfo {
            addr: info.addr,
            last_seen_ms: info.last_seen_ms,
            rssi: info.rssi,
            online: info.online,
            object_count: info.object_count,
        };
        written += 1;
    }
    written as c_int
}

/// Online state of a node.
#[no_mangle]
pub unsafe extern "C" fn xslot_is_node_online(handle: *mut c_void, addr: u16) -> bool {
    match manager_ref(handle) {
        Some(manager) => manager.is_node_online(addr),
        None => false,
    }
}

/// Register the raw data callback.
#[no_mangle]
pub unsafe extern "C" fn xslot_set_data_callback(
    handle: *mut c_void,
    callback: XslotDataCallback,
    ctx: *mut c_void,
) {
    if let (Some(manager), Some(callback)) = (manager_ref(handle), callback) {
        let ctx = CallbackCtx(ctx);
        manager.set_data_callback(Box::new(move |from, data| {
            let ctx = ctx;
            unsafe { callback(ctx.0, from, data.as_ptr(), data.len() as u8) };
        }));
    }
}

/// Register the node online/offline callback.
#[no_mangle]
pub unsafe extern "C" fn xslot_set_node_callback(
    handle: *mut c_void,
    callback: XslotNodeCallback,
    ctx: *mut c_void,
) {
    if let (Some(manager), Some(callback)) = (manager_ref(handle), callback) {
        let ctx = CallbackCtx(ctx);
        manager.set_node_callback(Box::new(move |addr, online| {
            let ctx = ctx;
            unsafe { callback(ctx.0, addr, online) };
        }));
    }
}

/// Register the write-request callback.
#[no_mangle]
pub unsafe extern "C" fn xslot_set_write_callback(
    handle: *mut c_void,
    callback: XslotWriteCallback,
    ctx: *mut c_void,
) {
    if let (Some(manager), Some(callback)) = (manager_ref(handle), callback) {
        let ctx = CallbackCtx(ctx);
        manager.set_write_callback(Box::new(move |from, obj| {
            let ctx = ctx;
            let c_obj = XslotObject::from_object(obj);
            unsafe { callback(ctx.0, from, &c_obj) };
        }));
    }
}

/// Register the telemetry callback.
#[no_mangle]
pub unsafe extern "C" fn xslot_set_report_callback(
    handle: *mut c_void,
    callback: XslotReportCallback,
    ctx: *mut c_void,
) {
    if let (Some(manager), Some(callback)) = (manager_ref(handle), callback) {
        let ctx = CallbackCtx(ctx);
        manager.set_report_callback(Box::new(move |from, objects| {
            let ctx = ctx;
            let c_objects: Vec<XslotObject> =
                objects.iter().map(XslotObject::from_object).collect();
            unsafe { callback(ctx.0, from, c_objects.as_ptr(), c_objects.len() as u8) };
        }));
    }
}

/// Update the wireless parameters.
#[no_mangle]
pub unsafe extern "C" fn xslot_update_wireless_config(
    handle: *mut c_void,
    cell_id: u8,
    power_dbm: i8,
) -> c_int {
    match manager_ref(handle) {
        Some(manager) => to_code(manager.update_wireless_config(cell_id, power_dbm)),
        None => XSlotError::InvalidParam.code(),
    }
}

/// Deserialize an object batch from a frame payload, auto-detecting the
/// dialect. Returns the object count, or a negative error code.
#[no_mangle]
pub unsafe extern "C" fn xslot_deserialize_objects(
    data: *const u8,
    len: u8,
    objects: *mut XslotObject,
    max_count: u8,
) -> c_int {
    if data.is_null() || objects.is_null() || max_count == 0 {
        return XSlotError::InvalidParam.code();
    }

    let payload = std::slice::from_raw_parts(data, len as usize);
    match crate::object::deserialize_objects(payload, max_count as usize) {
        Ok(decoded) => {
            let out = std::slice::from_raw_parts_mut(objects, max_count as usize);
            for (slot, obj) in out.iter_mut().zip(&decoded) {
                *slot = XslotObject::from_object(obj);
            }
            decoded.len() as c_int
        }
        Err(e) => e.code(),
    }
}

/// Library version as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn xslot_get_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Description of an error code as a static NUL-terminated string.
#[no_mangle]
pub extern "C" fn xslot_strerror(code: c_int) -> *const c_char {
    let text: &'static str = match code {
        0 => "ok\0",
        -1 => "invalid parameter\0",
        -2 => "operation timed out\0",
        -3 => "CRC check failed\0",
        -4 => "buffer capacity exceeded\0",
        -5 => "resource busy\0",
        -6 => "node offline\0",
        -7 => "no device detected\0",
        -8 => "stack not started\0",
        -9 => "send failed\0",
        _ => "unknown error\0",
    };
    debug_assert_eq!(&text[..text.len() - 1], strerror(code));
    text.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_conversion_round_trip() {
        let analog = BacnetObject::analog_input(7, 23.5).with_flags(true, false);
        let c_obj = XslotObject::from_object(&analog);
        assert_eq!(c_obj.object_type, 0);
        assert_eq!(c_obj.flags, 0x01);
        assert_eq!(c_obj.to_object(), analog);

        let binary = BacnetObject::binary_output(3, true);
        let c_obj = XslotObject::from_object(&binary);
        assert_eq!(c_obj.object_type, 4);
        assert_eq!(c_obj.to_object(), binary);

        let raw = BacnetObject::custom(9, 0x10, [0x5A; RAW_VALUE_SIZE]);
        let c_obj = XslotObject::from_object(&raw);
        assert_eq!(c_obj.to_object(), raw);
    }

    #[test]
    fn test_config_conversion() {
        let mut c_config = XslotConfig {
            local_addr: 0xFFBE,
            cell_id: 2,
            power_dbm: 10,
            uart_baudrate: 0,
            heartbeat_interval_ms: 0,
            heartbeat_timeout_ms: 30_000,
            power_mode: 2,
            uart_port: [0; 64],
        };
        for (i, byte) in b"/dev/ttyUSB0".iter().enumerate() {
            c_config.uart_port[i] = *byte as c_char;
        }

        let config = c_config.to_config();
        assert_eq!(config.local_addr, 0xFFBE);
        assert_eq!(config.uart_port, "/dev/ttyUSB0");
        assert_eq!(config.uart_baudrate, 115_200);
        assert_eq!(config.heartbeat_interval_ms, 5_000);
        assert_eq!(config.heartbeat_timeout_ms, 30_000);
        assert_eq!(config.power_mode, PowerMode::Low);
    }

    #[test]
    fn test_init_deinit_lifecycle() {
        let c_config = XslotConfig {
            local_addr: 0xFFFE,
            cell_id: 0,
            power_dbm: 0,
            uart_baudrate: 0,
            heartbeat_interval_ms: 0,
            heartbeat_timeout_ms: 0,
            power_mode: 3,
            uart_port: [0; 64],
        };

        unsafe {
            let handle = xslot_init(&c_config);
            assert!(!handle.is_null());
            assert_eq!(xslot_get_run_mode(handle), 0);
            // Not started yet
            assert_eq!(
                xslot_send_ping(handle, 0xFFBE),
                XSlotError::NotInitialized.code()
            );
            xslot_deinit(handle);
        }

        unsafe {
            assert!(xslot_init(std::ptr::null()).is_null());
        }
    }

    #[test]
    fn test_deserialize_objects_c_surface() {
        let objects = vec![
            BacnetObject::analog_input(7, 23.5),
            BacnetObject::binary_input(3, true),
        ];
        let mut payload = [0u8; 64];
        let len = crate::object::full::serialize_objects(&objects, &mut payload).unwrap();

        let mut out = [XslotObject {
            object_id: 0,
            object_type: 0,
            flags: 0,
            value: XslotValue { binary: 0 },
        }; 8];

        let count = unsafe {
            xslot_deserialize_objects(payload.as_ptr(), len as u8, out.as_mut_ptr(), 8)
        };
        assert_eq!(count, 2);
        assert_eq!(out[0].to_object(), objects[0]);
        assert_eq!(out[1].to_object(), objects[1]);
    }

    #[test]
    fn test_version_and_strerror() {
        let version = unsafe { std::ffi::CStr::from_ptr(xslot_get_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));

        let text = unsafe { std::ffi::CStr::from_ptr(xslot_strerror(-3)) };
        assert_eq!(text.to_str().unwrap(), "CRC check failed");
    }
}
