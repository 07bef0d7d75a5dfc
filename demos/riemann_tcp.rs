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

use logforth_append_riemann::Error;
use logforth_append_riemann::append::Riemann;
use logforth_append_riemann::config::RiemannConfigBuilder;
use logforth_append_riemann::diagnostic::ThreadLocalDiagnostic;

fn main() -> Result<(), Error> {
    println!(
        r#"Run a Riemann server on localhost:5555, then run this example with:

    RIEMANN_SERVICE_NAME=demo RIEMANN_LOG_LEVEL=info cargo run --example riemann_tcp
"#
    );

    let config = RiemannConfigBuilder::from_env()?.tcp(true).build()?;
    let mut riemann = Riemann::new(config);
    riemann.start()?;

    logforth_append_riemann::builder()
        .dispatch(|d| d.diagnostic(ThreadLocalDiagnostic::default()).append(riemann))
        .apply();

    ThreadLocalDiagnostic::insert("request_id", "42");
    log::info!("user signed in");
    log::warn!(marker = "audit"; "password about to expire");

    let err = std::io::Error::other("connection reset by peer");
    log::error!(err:err = err; "payment gateway unreachable");
    log::debug!("cache warmed");

    log::logger().flush();
    Ok(())
}
