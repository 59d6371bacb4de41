//! Print a bcrypt hash for use as `HASHED_PASSWORD`.
//!
//! Usage: `hash_password <password>`

use std::process::ExitCode;

use token_gate::password::hash_password;

fn main() -> ExitCode {
    let Some(password) = std::env::args().nth(1) else {
        eprintln!("usage: hash_password <password>");
        return ExitCode::FAILURE;
    };

    match hash_password(&password) {
        Ok(hashed) => {
            println!("{hashed}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to hash password: {err}");
            ExitCode::FAILURE
        }
    }
}
