use std::collections::HashMap;

use devprov_lifecycle::LifecycleService;

use super::print_json;

pub fn devices(service: &LifecycleService, params: Vec<(String, String)>) -> anyhow::Result<()> {
    let params: HashMap<_, _> = params.into_iter().collect();
    let listing = service.list_devices(&params)?;
    print_json(&listing)
}

pub fn history(service: &LifecycleService, params: Vec<(String, String)>) -> anyhow::Result<()> {
    let params: HashMap<_, _> = params.into_iter().collect();
    let listing = service.list_history(&params)?;
    print_json(&listing)
}
