//! `wpib sites` – list configured sites.

use wpib_core::config::WpibConfig;

pub fn run_sites_list(cfg: &WpibConfig) {
    if cfg.sites.is_empty() {
        println!("No sites configured.");
        return;
    }
    println!("{:<16} {:<12} {}", "SITE", "USER", "URL");
    for (id, site) in &cfg.sites {
        println!("{:<16} {:<12} {}", id, site.username, site.url);
    }
}
