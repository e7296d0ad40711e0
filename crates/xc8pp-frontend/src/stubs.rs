//! Stand-in device headers.
//!
//! The declaration front end is a host compiler; it does not know the
//! PIC register map or the XC8 delay builtins. A synthesized `xc.h` is
//! written to a per-run temporary directory and added to the include path.
//! The directory and everything in it is deleted by [`StubRegistry::cleanup`]
//! or when the registry is dropped.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Register bit-field stubs: variable name and its bit names.
const REGISTER_STRUCTS: &[(&str, &[&str])] = &[
    ("PORTAbits", &["RA0", "RA1", "RA2", "RA3", "RA4", "RA5", "RA6", "RA7"]),
    ("PORTBbits", &["RB0", "RB1", "RB2", "RB3", "RB4", "RB5", "RB6", "RB7"]),
    ("PORTCbits", &["RC0", "RC1", "RC2", "RC3", "RC4", "RC5", "RC6", "RC7"]),
    ("TRISAbits", &["TRISA0", "TRISA1", "TRISA2", "TRISA3", "TRISA4", "TRISA5", "TRISA6", "TRISA7"]),
    ("TRISBbits", &["TRISB0", "TRISB1", "TRISB2", "TRISB3", "TRISB4", "TRISB5", "TRISB6", "TRISB7"]),
    ("TRISCbits", &["TRISC0", "TRISC1", "TRISC2", "TRISC3", "TRISC4", "TRISC5", "TRISC6", "TRISC7"]),
    ("INTCONbits", &["RBIF", "INTF", "T0IF", "RBIE", "INTE", "T0IE", "PEIE", "GIE"]),
    ("OPTION_REGbits", &["PS0", "PS1", "PS2", "PSA", "T0SE", "T0CS", "INTEDG", "RBPU"]),
    ("EECON1bits", &["RD", "WR", "WREN", "WRERR"]),
    ("STATUSbits", &["CARRY", "DC", "ZERO", "PD", "TO", "RP0", "RP1", "IRP"]),
];

/// Plain byte registers.
const BYTE_REGISTERS: &[&str] = &[
    "PORTA", "PORTB", "PORTC", "TRISA", "TRISB", "TRISC", "TMR0", "INTCON", "OPTION_REG",
    "EEDATA", "EEADR", "EECON1", "EECON2", "ADCON1", "STATUS",
];

/// Render the stand-in `xc.h` for a device.
pub fn device_header(device: &str, xtal_freq: u64) -> String {
    let mut out = String::new();
    let device_macro = device.trim_start_matches("PIC").to_ascii_uppercase();

    out.push_str("/* Generated by xc8pp for declaration analysis only. */\n");
    out.push_str("#ifndef _XC_H_\n#define _XC_H_\n\n");
    let _ = writeln!(out, "#define _{device_macro} 1");
    let _ = writeln!(out, "#ifndef _XTAL_FREQ\n#define _XTAL_FREQ {xtal_freq}\n#endif\n");

    out.push_str("#define __delay_ms(x) ((void)(x))\n");
    out.push_str("#define __delay_us(x) ((void)(x))\n");
    out.push_str("#define __interrupt(...)\n");
    out.push_str("#define __CONFIG(x)\n");
    out.push_str("#define _BV(bit) (1 << (bit))\n\n");

    for reg in BYTE_REGISTERS {
        let _ = writeln!(out, "extern volatile unsigned char {reg};");
    }
    out.push('\n');

    for (name, bits) in REGISTER_STRUCTS {
        out.push_str("extern volatile struct {\n");
        for bit in *bits {
            let _ = writeln!(out, "    unsigned {bit}:1;");
        }
        let _ = writeln!(out, "}} {name};\n");
    }

    out.push_str("#endif\n");
    out
}

/// Tracks the temporary stub directory of one run.
#[derive(Debug, Default)]
pub struct StubRegistry {
    dir: Option<TempDir>,
    files: Vec<PathBuf>,
}

impl StubRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `xc.h` for `device` (once per registry) and return the include directory.
    pub fn ensure_device_header(&mut self, device: &str, xtal_freq: u64) -> std::io::Result<PathBuf> {
        let dir = match &self.dir {
            Some(dir) => dir.path().to_path_buf(),
            None => {
                let created = tempfile::Builder::new().prefix("xc8pp-stubs-").tempdir()?;
                let dir = created.path().to_path_buf();
                debug!(path = %dir.display(), "created stub directory");
                self.dir = Some(created);
                dir
            }
        };

        let header = dir.join("xc.h");
        if !self.files.contains(&header) {
            std::fs::write(&header, device_header(device, xtal_freq))?;
            debug!(path = %header.display(), device, "wrote device stub header");
            self.files.push(header);
        }
        Ok(dir)
    }

    pub fn include_dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    /// Files written so far.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.files
    }

    /// Delete the stub directory. Failures are logged and otherwise ignored.
    pub fn cleanup(&mut self) {
        self.files.clear();
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(path = %path.display(), error = %e, "failed to remove stub directory");
            }
        }
    }
}

impl Drop for StubRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_header_contents() {
        let header = device_header("PIC16F876A", 8_000_000);
        assert!(header.contains("#define _16F876A 1"));
        assert!(header.contains("#define _XTAL_FREQ 8000000"));
        assert!(header.contains("#define __delay_ms(x)"));
        assert!(header.contains("unsigned RB7:1;"));
        assert!(header.contains("} PORTBbits;"));
    }

    #[test]
    fn test_registry_cleanup() {
        let mut registry = StubRegistry::new();
        let dir = registry.ensure_device_header("PIC16F876A", 4_000_000).unwrap();
        let again = registry.ensure_device_header("PIC16F876A", 4_000_000).unwrap();
        assert_eq!(dir, again);
        assert_eq!(registry.tracked().len(), 1);
        assert!(dir.join("xc.h").is_file());

        registry.cleanup();
        assert!(!dir.exists());
        assert!(registry.tracked().is_empty());
        assert!(registry.include_dir().is_none());
    }

    #[test]
    fn test_stub_directory_name() {
        let mut registry = StubRegistry::new();
        assert!(registry.include_dir().is_none());
        let dir = registry.ensure_device_header("PIC16F877A", 20_000_000).unwrap();
        assert_eq!(registry.include_dir(), Some(dir.as_path()));
        let name = dir.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("xc8pp-stubs-"), "{name}");
        assert!(dir.starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_drop_removes_directory() {
        let dir = {
            let mut registry = StubRegistry::new();
            registry.ensure_device_header("PIC18F4550", 4_000_000).unwrap()
        };
        assert!(!dir.exists());
    }
}
