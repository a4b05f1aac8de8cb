use ac_domain::config::{Config, ConfigSeverity};

/// Run all diagnostic checks and print a summary.
///
/// Returns `Ok(true)` when every check passes, `Ok(false)` when at least
/// one check failed.
pub fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("agentcore doctor");
    println!("================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_model_api_key(config, &mut all_passed);
    check_state_dir(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

fn check_model_api_key(config: &Config, all_passed: &mut bool) {
    if config.llm.api_key_env.is_empty() {
        print_check("Model API key", true, "no key required (api_key_env unset)".into());
        return;
    }
    let set = std::env::var(&config.llm.api_key_env)
        .map(|v| !v.is_empty())
        .unwrap_or(false);
    print_check(
        "Model API key",
        set,
        if set {
            config.llm.api_key_env.clone()
        } else {
            format!("{} not set", config.llm.api_key_env)
        },
    );
    if !set {
        *all_passed = false;
    }
}

fn check_state_dir(config: &Config, all_passed: &mut bool) {
    let path = &config.storage.state_dir;
    if let Err(e) = std::fs::create_dir_all(path) {
        print_check("State directory writable", false, format!("{}: {e}", path.display()));
        *all_passed = false;
        return;
    }
    let probe = path.join(".agentcore_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);
    print_check(
        "State directory writable",
        writable,
        if writable {
            format!("{} (writable)", path.display())
        } else {
            format!("{} (not writable)", path.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
