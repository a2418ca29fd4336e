//! Pedal discovery and raw report access via hidraw

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use thiserror::Error;

/// Elgato Stream Deck Pedal vendor ID
pub const VENDOR_ID: u16 = 0x0FD9;
/// Elgato Stream Deck Pedal product ID
pub const PRODUCT_ID: u16 = 0x0086;
/// Size of one input report
pub const REPORT_SIZE: usize = 8;

const SYSFS_HIDRAW: &str = "/sys/class/hidraw";
const DEV_ROOT: &str = "/dev";

/// Errors raised while locating or reading the pedal
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Pedal {vendor:04x}:{product:04x} not found - is it plugged in?")]
    DeviceNotFound { vendor: u16, product: u16 },

    #[error("Permission denied opening {} - check the udev rules for the pedal", .path.display())]
    DevicePermission { path: PathBuf },

    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to enumerate hidraw devices: {source}")]
    Enumerate {
        #[source]
        source: io::Error,
    },

    #[error("Failed to read from pedal: {source}")]
    Read {
        #[source]
        source: io::Error,
    },
}

/// Information about a hidraw device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device node, e.g. `/dev/hidraw3`
    pub path: PathBuf,
    pub vendor: u16,
    pub product: u16,
}

impl DeviceInfo {
    /// Get vendor:product string (e.g., "0fd9:0086")
    pub fn vendor_product(&self) -> String {
        format!("{:04x}:{:04x}", self.vendor, self.product)
    }

    pub fn is_pedal(&self) -> bool {
        self.vendor == VENDOR_ID && self.product == PRODUCT_ID
    }
}

/// Extract vendor and product from a hidraw `uevent` file.
///
/// The relevant line looks like `HID_ID=0003:00000FD9:00000086`.
fn parse_hid_id(uevent: &str) -> Option<(u16, u16)> {
    let id = uevent
        .lines()
        .find_map(|line| line.trim().strip_prefix("HID_ID="))?;

    let mut parts = id.split(':');
    let _bus = parts.next()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;

    Some((u16::try_from(vendor).ok()?, u16::try_from(product).ok()?))
}

/// Enumerate hidraw devices listed under `sysfs_root`, with device nodes
/// under `dev_root`.
fn enumerate_in(sysfs_root: &Path, dev_root: &Path) -> Result<Vec<DeviceInfo>, DeviceError> {
    let entries = match std::fs::read_dir(sysfs_root) {
        Ok(entries) => entries,
        // No hidraw class at all means no hidraw devices
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(DeviceError::Enumerate { source }),
    };

    let mut devices = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|source| DeviceError::Enumerate { source })?;
        let name = entry.file_name();

        let uevent_path = entry.path().join("device").join("uevent");
        let uevent = match std::fs::read_to_string(&uevent_path) {
            Ok(uevent) => uevent,
            Err(e) => {
                tracing::debug!("Could not read {}: {}", uevent_path.display(), e);
                continue;
            }
        };

        match parse_hid_id(&uevent) {
            Some((vendor, product)) => devices.push(DeviceInfo {
                path: dev_root.join(&name),
                vendor,
                product,
            }),
            None => tracing::debug!("No HID_ID in {}", uevent_path.display()),
        }
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// Enumerate all hidraw devices on the system
pub fn enumerate_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    enumerate_in(Path::new(SYSFS_HIDRAW), Path::new(DEV_ROOT))
}

/// Locate the pedal and open it in non-blocking mode
pub fn open_pedal() -> Result<PedalDevice, DeviceError> {
    let info = enumerate_devices()?
        .into_iter()
        .find(DeviceInfo::is_pedal)
        .ok_or(DeviceError::DeviceNotFound {
            vendor: VENDOR_ID,
            product: PRODUCT_ID,
        })?;

    tracing::info!("Found pedal {} at {}", info.vendor_product(), info.path.display());
    PedalDevice::open(&info.path)
}

/// A source of raw input reports.
pub trait ReportSource {
    /// Read one report into `buf`, waiting at most `timeout` for it.
    ///
    /// Returns the number of bytes read; `0` means nothing arrived in time.
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, DeviceError>;
}

/// An open hidraw node. The handle is closed on drop.
#[derive(Debug)]
pub struct PedalDevice {
    file: File,
    path: PathBuf,
}

impl PedalDevice {
    /// Open a hidraw node read-only and non-blocking
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::PermissionDenied => DeviceError::DevicePermission {
                    path: path.to_path_buf(),
                },
                _ => DeviceError::Open {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        tracing::debug!("Opened {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSource for PedalDevice {
    fn read_report(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, DeviceError> {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) => return Ok(0),
            Ok(_) => {}
            Err(Errno::EINTR) => return Ok(0),
            Err(errno) => {
                return Err(DeviceError::Read {
                    source: io::Error::from(errno),
                })
            }
        }

        match self.file.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(source) => Err(DeviceError::Read { source }),
        }
    }
}

impl Drop for PedalDevice {
    fn drop(&mut self) {
        tracing::debug!("Closing {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn add_hidraw(sysfs: &Path, name: &str, uevent: &str) {
        let dir = sysfs.join(name).join("device");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("uevent"), uevent).unwrap();
    }

    #[test]
    fn test_parse_hid_id() {
        let uevent = "DRIVER=hid-generic\nHID_ID=0003:00000FD9:00000086\nHID_NAME=Elgato StreamDeck Pedal\n";
        assert_eq!(parse_hid_id(uevent), Some((VENDOR_ID, PRODUCT_ID)));
    }

    #[test]
    fn test_parse_hid_id_missing_or_malformed() {
        assert_eq!(parse_hid_id("DRIVER=hid-generic\n"), None);
        assert_eq!(parse_hid_id("HID_ID=0003:zzzz:00000086\n"), None);
        assert_eq!(parse_hid_id("HID_ID=0003:00000FD9\n"), None);
        // Out of range for a 16-bit ID
        assert_eq!(parse_hid_id("HID_ID=0003:00010000:00000086\n"), None);
    }

    #[test]
    fn test_enumerate_finds_devices() {
        let sysfs = TempDir::new().unwrap();
        add_hidraw(sysfs.path(), "hidraw1", "HID_ID=0003:0000046D:0000C52B\n");
        add_hidraw(sysfs.path(), "hidraw0", "HID_ID=0003:00000FD9:00000086\n");
        add_hidraw(sysfs.path(), "hidraw2", "DRIVER=other\n");

        let devices = enumerate_in(sysfs.path(), Path::new("/dev")).unwrap();
        assert_eq!(devices.len(), 2, "entries without HID_ID should be skipped");
        assert_eq!(devices[0].path, PathBuf::from("/dev/hidraw0"));
        assert!(devices[0].is_pedal());
        assert_eq!(devices[0].vendor_product(), "0fd9:0086");
        assert_eq!(devices[1].vendor_product(), "046d:c52b");
        assert!(!devices[1].is_pedal());
    }

    #[test]
    fn test_enumerate_missing_sysfs_is_empty() {
        let sysfs = TempDir::new().unwrap();
        let devices = enumerate_in(&sysfs.path().join("absent"), Path::new("/dev")).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_enumerate_unreadable_sysfs_keeps_cause() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("hidraw");
        std::fs::write(&not_a_dir, "").unwrap();

        match enumerate_in(&not_a_dir, Path::new("/dev")) {
            Err(DeviceError::Enumerate { source }) => {
                assert_ne!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Expected Enumerate error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_node_fails() {
        let dir = TempDir::new().unwrap();
        match PedalDevice::open(&dir.path().join("hidraw9")) {
            Err(DeviceError::Open { path, source }) => {
                assert!(path.ends_with("hidraw9"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Expected Open error, got: {:?}", other),
        }
    }

    #[test]
    fn test_read_report_from_file() {
        // A regular file is always readable, which exercises the read path
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hidraw0");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        drop(file);

        let mut device = PedalDevice::open(&path).unwrap();
        assert_eq!(device.path(), path.as_path());

        let mut buf = [0u8; REPORT_SIZE];
        let n = device.read_report(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, REPORT_SIZE);
        assert_eq!(buf[4], 1);

        // End of file reads as "nothing arrived"
        let n = device.read_report(&mut buf, Duration::from_millis(10)).unwrap();
        assert_eq!(n, 0);
    }
}
