use serde::Serialize;

use crate::catalog::default_catalog;
use crate::endpoint::{AuthRequirement, Catalog};

#[derive(Debug, Serialize)]
struct RouteRow {
    name: &'static str,
    method: &'static str,
    route: &'static str,
    upstream: &'static str,
    auth: &'static str,
}

pub fn handle(json: bool) -> anyhow::Result<()> {
    let catalog = default_catalog()?;
    let rows = rows(&catalog);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<7} {:<48} {:<52} {:<16} NAME", "METHOD", "ROUTE", "UPSTREAM", "AUTH");
    for row in &rows {
        println!(
            "{:<7} {:<48} {:<52} {:<16} {}",
            row.method, row.route, row.upstream, row.auth, row.name
        );
    }
    println!("\n{} endpoints", rows.len());
    Ok(())
}

fn rows(catalog: &Catalog) -> Vec<RouteRow> {
    catalog
        .endpoints()
        .iter()
        .map(|endpoint| RouteRow {
            name: endpoint.name,
            method: endpoint.method.as_str(),
            route: endpoint.route,
            upstream: endpoint.upstream,
            auth: auth_label(endpoint.auth),
        })
        .collect()
}

fn auth_label(auth: AuthRequirement) -> &'static str {
    match auth {
        AuthRequirement::None => "none",
        AuthRequirement::OptionalBearer => "optional-bearer",
        AuthRequirement::RequiredBearer => "required-bearer",
        AuthRequirement::CookieSession => "cookie-session",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_cover_catalog() {
        let catalog = default_catalog().unwrap();
        let rows = rows(&catalog);
        assert_eq!(rows.len(), catalog.len());
        assert!(rows
            .iter()
            .any(|row| row.name == "account.totp.get" && row.auth == "required-bearer"));
    }
}
