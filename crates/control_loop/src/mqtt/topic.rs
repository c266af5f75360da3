use common::domain::{DomainError, DomainResult};

/// Build the control topic for one vehicle: `{prefix}/{short_vehicle_id}`
///
/// # Examples
/// ```
/// use control_loop::mqtt::control_topic;
///
/// assert_eq!(control_topic("factory/control", "007"), "factory/control/007");
/// ```
pub fn control_topic(prefix: &str, short_vehicle_id: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), short_vehicle_id)
}

/// Parse broker address in format mqtt://host:port, tcp://host:port, host:port or host
///
/// `default_port` is used when the address carries no port.
pub fn parse_broker_url(url: &str, default_port: u16) -> DomainResult<(&str, u16)> {
    let address = url.trim_start_matches("mqtt://");
    let address = address.trim_start_matches("tcp://");

    let (host, port) = match address.split_once(':') {
        None => (address, default_port),
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::InvalidConfig(format!("Invalid port in broker URL: {}", url))
            })?;
            (host, port)
        }
    };

    if host.is_empty() || host.contains(['/', ':']) {
        return Err(DomainError::InvalidConfig(format!(
            "Invalid broker URL format: {}",
            url
        )));
    }

    Ok((host, port))
}

/// Check an MQTT subscription filter
///
/// `+` must occupy a whole level; `#` must occupy the whole last level.
pub fn validate_subscription_filter(filter: &str) -> DomainResult<()> {
    if filter.is_empty() {
        return Err(DomainError::InvalidTopic(
            "Subscription filter cannot be empty".to_string(),
        ));
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (index, level) in levels.iter().enumerate() {
        let misplaced_plus = level.contains('+') && *level != "+";
        let misplaced_hash = level.contains('#') && (*level != "#" || index != last);

        if misplaced_plus || misplaced_hash {
            return Err(DomainError::InvalidTopic(format!(
                "Invalid wildcard placement in subscription filter '{}'",
                filter
            )));
        }
    }

    Ok(())
}

/// Check a control topic prefix: non-empty and free of wildcards
pub fn validate_topic_prefix(prefix: &str) -> DomainResult<()> {
    if prefix.trim_end_matches('/').is_empty() {
        return Err(DomainError::InvalidTopic(
            "Control topic prefix cannot be empty".to_string(),
        ));
    }

    if prefix.contains(['+', '#']) {
        return Err(DomainError::InvalidTopic(format!(
            "Control topic prefix '{}' cannot contain wildcards",
            prefix
        )));
    }

    Ok(())
}
