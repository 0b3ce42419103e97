//! Address arithmetic on the workers network

use crate::error::{InfraError, Result};
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Address at `index` inside `net`.
///
/// Index 0 is the network address. Negative indices count from the end, so
/// -1 is the last address of the network.
pub fn nth_address(net: &IpNet, index: i128) -> Result<IpAddr> {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    let size: i128 = if host_bits >= 127 {
        i128::MAX
    } else {
        1i128 << host_bits
    };

    let offset = if index < 0 { size + index } else { index };
    if offset < 0 || offset >= size {
        return Err(InfraError::Cidr(format!(
            "index {} is out of range for {}",
            index, net
        )));
    }

    Ok(match net.network() {
        IpAddr::V4(base) => {
            let addr = u128::from(u32::from(base)) + offset as u128;
            let addr = u32::try_from(addr)
                .map_err(|_| InfraError::Cidr(format!("index {} overflows {}", index, net)))?;
            IpAddr::V4(Ipv4Addr::from(addr))
        }
        IpAddr::V6(base) => {
            let addr = u128::from(base)
                .checked_add(offset as u128)
                .ok_or_else(|| InfraError::Cidr(format!("index {} overflows {}", index, net)))?;
            IpAddr::V6(Ipv6Addr::from(addr))
        }
    })
}

pub fn parse_cidr(cidr: &str) -> Result<IpNet> {
    cidr.trim()
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|e| InfraError::Cidr(format!("invalid CIDR '{}': {}", cidr, e)))
}

/// Fixed addresses of a cluster segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressPlan {
    pub network: IpNet,
    pub gateway: IpAddr,
    pub dhcp_server: IpAddr,
    pub dhcp_range_start: IpAddr,
    pub dhcp_range_end: IpAddr,
}

const GATEWAY_INDEX: i128 = 1;
const DHCP_SERVER_INDEX: i128 = 2;
const DHCP_RANGE_START_INDEX: i128 = 10;
const DHCP_RANGE_END_INDEX: i128 = -2;

impl AddressPlan {
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        let network = parse_cidr(cidr)?;
        let plan = Self {
            network,
            gateway: nth_address(&network, GATEWAY_INDEX)?,
            dhcp_server: nth_address(&network, DHCP_SERVER_INDEX)?,
            dhcp_range_start: nth_address(&network, DHCP_RANGE_START_INDEX)?,
            dhcp_range_end: nth_address(&network, DHCP_RANGE_END_INDEX)?,
        };
        if plan.dhcp_range_start > plan.dhcp_range_end {
            return Err(InfraError::Cidr(format!(
                "{} is too small for a DHCP range",
                network
            )));
        }
        Ok(plan)
    }

    /// Gateway address with prefix length, e.g. `10.250.0.1/16`
    pub fn gateway_cidr(&self) -> String {
        format!("{}/{}", self.gateway, self.network.prefix_len())
    }

    pub fn dhcp_server_cidr(&self) -> String {
        format!("{}/{}", self.dhcp_server, self.network.prefix_len())
    }

    /// DHCP range in `start-end` notation
    pub fn dhcp_range(&self) -> String {
        format!("{}-{}", self.dhcp_range_start, self.dhcp_range_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(net: &str, index: i128) -> Result<String> {
        nth_address(&parse_cidr(net).unwrap(), index).map(|a| a.to_string())
    }

    #[test]
    fn test_nth_address() {
        assert_eq!(addr("10.0.96.0/20", 0).unwrap(), "10.0.96.0");
        assert_eq!(addr("10.0.96.0/20", 256).unwrap(), "10.0.97.0");
        assert_eq!(addr("10.0.96.0/20", -1).unwrap(), "10.0.111.255");
        assert_eq!(addr("10.0.96.0/20", 4095).unwrap(), "10.0.111.255");
        assert_eq!(addr("10.0.96.0/20", -4096).unwrap(), "10.0.96.0");
    }

    #[test]
    fn test_out_of_range() {
        assert!(matches!(addr("10.0.96.0/20", 4096), Err(InfraError::Cidr(_))));
        assert!(matches!(addr("10.0.96.0/20", -4097), Err(InfraError::Cidr(_))));
        assert!(addr("192.0.2.7/32", 1).is_err());
        assert_eq!(addr("192.0.2.7/32", 0).unwrap(), "192.0.2.7");
    }

    #[test]
    fn test_ipv6() {
        assert_eq!(addr("2001:db8::/64", 1).unwrap(), "2001:db8::1");
        assert_eq!(
            addr("2001:db8::/64", -1).unwrap(),
            "2001:db8::ffff:ffff:ffff:ffff"
        );
    }

    #[test]
    fn test_host_bits_are_truncated() {
        assert_eq!(addr("10.0.100.7/20", 0).unwrap(), "10.0.96.0");
    }

    #[test]
    fn test_address_plan() {
        let plan = AddressPlan::from_cidr("10.250.0.0/16").unwrap();
        assert_eq!(plan.gateway_cidr(), "10.250.0.1/16");
        assert_eq!(plan.dhcp_server_cidr(), "10.250.0.2/16");
        assert_eq!(plan.dhcp_range(), "10.250.0.10-10.250.255.254");

        assert!(AddressPlan::from_cidr("10.0.0.0/29").is_err());
        assert!(AddressPlan::from_cidr("not-a-cidr").is_err());
    }
}
