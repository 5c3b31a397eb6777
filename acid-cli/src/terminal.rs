//! Terminal rendering of the core's presentation events.

use acid_core::{Method, MethodAvailability, UiSurface};
use colored::Colorize;

pub struct TerminalUi;

fn method_label(method: Method) -> &'static str {
    match method {
        Method::Biometric => "Device Biometrics",
        Method::Face => "Face Verification",
        Method::Totp => "QR Code/PIN",
        Method::TrustedParty => "Trusted Party Auth",
    }
}

impl UiSurface for TerminalUi {
    fn show_method_selection(&self, update_mode: bool, availability: MethodAvailability) {
        let heading = if update_mode {
            "Update Verification Methods"
        } else {
            "Choose Verification Method"
        };
        println!("\n{}", heading.bold());
        for (index, method) in Method::ALL.iter().enumerate() {
            let enrolled = match method {
                Method::Biometric => availability.passkey_enrolled,
                Method::Face => availability.face_enrolled,
                Method::Totp => availability.totp_enrolled,
                Method::TrustedParty => None,
            };
            let hint = match enrolled {
                Some(true) => " (enrolled)".green().to_string(),
                Some(false) => " (not enrolled)".yellow().to_string(),
                None => String::new(),
            };
            println!("  {}. {}{}", index + 1, method_label(*method), hint);
        }
    }

    fn method_activated(&self, method: Method, update_mode: bool) {
        let action = if update_mode { "Updating" } else { "Verifying with" };
        println!("{} {}...", action, method_label(method).bold());
    }

    fn show_provisioning(&self, qr_code_data_url: &str) {
        println!(
            "{}\n{}",
            "Scan this payload with Microsoft or Google Authenticator:".bold(),
            qr_code_data_url
        );
    }

    fn prompt_code(&self, _method: Method, destination: Option<&str>) {
        match destination {
            Some(destination) => {
                println!("Enter the 6 digit code sent to {}", destination.bold())
            }
            None => println!("Enter your 6 digit code"),
        }
    }

    fn show_error(&self, _method: Option<Method>, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    fn show_success(&self, _method: Method, update_mode: bool) {
        let message = if update_mode {
            "Verification data successfully updated."
        } else {
            "Identity successfully verified."
        };
        println!("{}", message.green().bold());
    }

    fn session_complete(&self) {
        println!("{}", "Session complete.".green());
    }
}
