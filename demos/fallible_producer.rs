// Copyright 2026 oncecache Project Authors
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

use anyhow::anyhow;
use oncecache::{Cache, ErrorKind};

#[derive(Debug)]
struct Config {
    port: u16,
}

fn load(path: &str) -> anyhow::Result<Config> {
    match path {
        "server.toml" => Ok(Config { port: 8080 }),
        _ => Err(anyhow!("file not found: {path}")),
    }
}

fn main() {
    let cache: Cache<&'static str, u16> = Cache::new();

    let port = cache
        .try_get_or_insert_with("server.toml", || load("server.toml").map(|c| c.port))
        .unwrap();
    assert_eq!(port, 8080);

    let e = cache
        .try_get_or_insert_with("missing.toml", || load("missing.toml").map(|c| c.port))
        .unwrap_err();
    assert_eq!(e.kind(), ErrorKind::External);
    println!("{e}");

    // The failure is cached. Later callers get it back without running their producer.
    let again = cache.get_or_insert_with("missing.toml", || unreachable!()).unwrap_err();
    assert!(e.is_same(&again));

    // Removing the key clears it.
    assert!(cache.try_remove(&"missing.toml").is_err());
    assert_eq!(cache.get_or_insert_with("missing.toml", || 9090).unwrap(), 9090);
}
