// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Resolution of the host name reported on every event.

use crate::Error;
use crate::ErrorKind;

/// Resolve the host name of this machine from the operating system.
///
/// Fails when the OS lookup fails or yields an empty or non-UTF-8 name.
pub fn resolve_hostname() -> Result<String, Error> {
    let hostname = system_hostname()?;
    if hostname.is_empty() {
        return Err(Error::new(ErrorKind::Hostname, "operating system reported an empty hostname"));
    }
    Ok(hostname)
}

#[cfg(unix)]
fn system_hostname() -> Result<String, Error> {
    let hostname = nix::unistd::gethostname()
        .map_err(|err| Error::new(ErrorKind::Hostname, "failed to resolve hostname").with_source(err))?;
    hostname.into_string().map_err(|raw| {
        Error::new(ErrorKind::Hostname, "hostname is not valid UTF-8").with_context("hostname", raw.to_string_lossy())
    })
}

#[cfg(not(unix))]
fn system_hostname() -> Result<String, Error> {
    std::env::var("COMPUTERNAME")
        .map_err(|err| Error::new(ErrorKind::Hostname, "failed to resolve hostname").with_source(err))
}
