//! Minimal rtnetlink client for link, address and route configuration.
//!
//! A socket is bound to the network namespace of the thread that created it,
//! so a fresh [`NetlinkSocket`] must be opened after switching namespaces.

use std::ffi::CString;
use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use hull_common::error::{HullError, Result};
use ipnetwork::Ipv4Network;

const NETLINK_ROUTE: i32 = 0;

const RTM_NEWLINK: u16 = 16;
const RTM_DELLINK: u16 = 17;
const RTM_NEWADDR: u16 = 20;
const RTM_NEWROUTE: u16 = 24;

const NLMSG_ERROR: u16 = 2;

const NLM_F_REQUEST: u16 = 0x0001;
const NLM_F_ACK: u16 = 0x0004;
const NLM_F_EXCL: u16 = 0x0200;
const NLM_F_CREATE: u16 = 0x0400;

const NLA_F_NESTED: u16 = 1 << 15;

const IFF_UP: u32 = 0x1;

const IFLA_ADDRESS: u16 = 1;
const IFLA_IFNAME: u16 = 3;
const IFLA_MASTER: u16 = 10;
const IFLA_LINKINFO: u16 = 18;
const IFLA_NET_NS_FD: u16 = 28;
const IFLA_INFO_KIND: u16 = 1;
const IFLA_INFO_DATA: u16 = 2;
const VETH_INFO_PEER: u16 = 1;

const IFA_ADDRESS: u16 = 1;
const IFA_LOCAL: u16 = 2;

const RTA_OIF: u16 = 4;
const RTA_GATEWAY: u16 = 5;

const RT_TABLE_MAIN: u8 = 254;
const RTPROT_BOOT: u8 = 3;
const RT_SCOPE_UNIVERSE: u8 = 0;
const RTN_UNICAST: u8 = 1;

const NLMSG_HDR_LEN: usize = 16;
const NLA_HDR_LEN: usize = 4;

#[allow(clippy::cast_possible_truncation)]
const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;
#[allow(clippy::cast_possible_truncation)]
const AF_INET: u8 = libc::AF_INET as u8;

const fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Builder for a single rtnetlink request.
///
/// Fields are written in native byte order, as the kernel expects.
#[derive(Debug, Clone)]
pub struct Message {
    buf: Vec<u8>,
    nested: Vec<usize>,
}

impl Message {
    /// Starts a request of `msg_type` with `flags` (REQUEST and ACK are added).
    #[must_use]
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let mut buf = Vec::with_capacity(128);
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&msg_type.to_ne_bytes());
        buf.extend_from_slice(&(flags | NLM_F_REQUEST | NLM_F_ACK).to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes());
        buf.extend_from_slice(&0u32.to_ne_bytes());
        Self {
            buf,
            nested: Vec::new(),
        }
    }

    /// Appends an `ifinfomsg` header.
    #[must_use]
    pub fn ifinfo(mut self, index: i32, flags: u32, change: u32) -> Self {
        self.buf.push(AF_UNSPEC);
        self.buf.push(0);
        self.buf.extend_from_slice(&0u16.to_ne_bytes());
        self.buf.extend_from_slice(&index.to_ne_bytes());
        self.buf.extend_from_slice(&flags.to_ne_bytes());
        self.buf.extend_from_slice(&change.to_ne_bytes());
        self
    }

    /// Appends an IPv4 `ifaddrmsg` header.
    #[must_use]
    pub fn ifaddr(mut self, prefix: u8, index: u32) -> Self {
        self.buf.extend_from_slice(&[AF_INET, prefix, 0, 0]);
        self.buf.extend_from_slice(&index.to_ne_bytes());
        self
    }

    /// Appends an IPv4 unicast `rtmsg` header for the main table.
    #[must_use]
    pub fn rtmsg(mut self, dst_len: u8) -> Self {
        self.buf.extend_from_slice(&[
            AF_INET,
            dst_len,
            0,
            0,
            RT_TABLE_MAIN,
            RTPROT_BOOT,
            RT_SCOPE_UNIVERSE,
            RTN_UNICAST,
        ]);
        self.buf.extend_from_slice(&0u32.to_ne_bytes());
        self
    }

    /// Appends a raw attribute, padded to four bytes.
    #[must_use]
    pub fn attr(mut self, kind: u16, value: &[u8]) -> Self {
        let len = NLA_HDR_LEN + value.len();
        self.push_attr_header(len, kind);
        self.buf.extend_from_slice(value);
        self.buf.resize(align4(self.buf.len()), 0);
        self
    }

    /// Appends a NUL-terminated string attribute.
    #[must_use]
    pub fn attr_str(self, kind: u16, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.attr(kind, &bytes)
    }

    /// Appends a `u32` attribute.
    #[must_use]
    pub fn attr_u32(self, kind: u16, value: u32) -> Self {
        self.attr(kind, &value.to_ne_bytes())
    }

    /// Opens a nested attribute; close it with [`Message::end_nested`].
    #[must_use]
    pub fn begin_nested(mut self, kind: u16) -> Self {
        self.nested.push(self.buf.len());
        self.push_attr_header(0, kind | NLA_F_NESTED);
        self
    }

    /// Closes the innermost nested attribute.
    #[must_use]
    pub fn end_nested(mut self) -> Self {
        if let Some(start) = self.nested.pop() {
            let len = self.buf.len() - start;
            self.buf[start..start + 2].copy_from_slice(&len_u16(len).to_ne_bytes());
        }
        self
    }

    /// Appends raw header bytes inside a nested attribute (used for the
    /// veth peer's `ifinfomsg`).
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Finalizes the request with sequence number `seq`.
    #[must_use]
    pub fn finish(mut self, seq: u32) -> Vec<u8> {
        let len = u32::try_from(self.buf.len()).unwrap_or(u32::MAX);
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
        self.buf
    }

    fn push_attr_header(&mut self, len: usize, kind: u16) {
        self.buf.extend_from_slice(&len_u16(len).to_ne_bytes());
        self.buf.extend_from_slice(&kind.to_ne_bytes());
    }
}

fn len_u16(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

/// Bytes of an empty `ifinfomsg`, used as the veth peer header.
fn empty_ifinfo() -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[0] = AF_UNSPEC;
    bytes
}

/// Extracts the error code from an `NLMSG_ERROR` reply; 0 is an ACK.
fn parse_ack(reply: &[u8]) -> Option<i32> {
    if reply.len() < NLMSG_HDR_LEN + 4 {
        return None;
    }
    let msg_type = u16::from_ne_bytes([reply[4], reply[5]]);
    if msg_type != NLMSG_ERROR {
        return None;
    }
    let code = &reply[NLMSG_HDR_LEN..NLMSG_HDR_LEN + 4];
    Some(i32::from_ne_bytes([code[0], code[1], code[2], code[3]]))
}

/// Returns the index of interface `name`.
///
/// # Errors
///
/// Returns [`HullError::NotFound`] if no such interface exists in the
/// calling thread's network namespace.
pub fn ifindex(name: &str) -> Result<u32> {
    let c_name = CString::new(name).map_err(|e| HullError::Config {
        message: format!("invalid interface name {name:?}: {e}"),
    })?;
    // SAFETY: c_name is a valid NUL-terminated string for the call's duration.
    #[allow(unsafe_code)]
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(HullError::NotFound {
            kind: "interface",
            id: name.to_string(),
        });
    }
    Ok(index)
}

/// An `AF_NETLINK`/`NETLINK_ROUTE` socket.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: OwnedFd,
    seq: u32,
}

#[allow(unsafe_code)]
impl NetlinkSocket {
    /// Opens and binds a route netlink socket in the current namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be created or bound.
    pub fn open() -> Result<Self> {
        // SAFETY: plain socket(2) call; the result is checked below.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                NETLINK_ROUTE,
            )
        };
        if raw < 0 {
            return Err(HullError::kernel("netlink socket", io::Error::last_os_error()));
        }
        // SAFETY: raw is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: sockaddr_nl is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        #[allow(clippy::cast_possible_truncation)]
        let family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_family = family;
        #[allow(clippy::cast_possible_truncation)]
        let addr_len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        // SAFETY: addr outlives the call and addr_len matches its size.
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                std::ptr::from_ref(&addr).cast::<libc::sockaddr>(),
                addr_len,
            )
        };
        if ret < 0 {
            return Err(HullError::kernel("netlink bind", io::Error::last_os_error()));
        }
        Ok(Self { fd, seq: 0 })
    }

    fn request(&mut self, op: &str, message: Message) -> Result<()> {
        self.seq = self.seq.wrapping_add(1);
        let bytes = message.finish(self.seq);

        // SAFETY: bytes is a live buffer of the given length.
        let sent = unsafe {
            libc::send(
                self.fd.as_raw_fd(),
                bytes.as_ptr().cast::<libc::c_void>(),
                bytes.len(),
                0,
            )
        };
        if sent < 0 {
            return Err(HullError::kernel(op, io::Error::last_os_error()));
        }

        let mut reply = [0u8; 4096];
        // SAFETY: reply is a writable buffer of the given length.
        let received = unsafe {
            libc::recv(
                self.fd.as_raw_fd(),
                reply.as_mut_ptr().cast::<libc::c_void>(),
                reply.len(),
                0,
            )
        };
        let Ok(received) = usize::try_from(received) else {
            return Err(HullError::kernel(op, io::Error::last_os_error()));
        };

        match parse_ack(&reply[..received]) {
            Some(0) | None => Ok(()),
            Some(code) => Err(HullError::kernel(op, io::Error::from_raw_os_error(-code))),
        }
    }

    /// Creates a bridge device named `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn create_bridge(&mut self, name: &str) -> Result<()> {
        let msg = Message::new(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL)
            .ifinfo(0, 0, 0)
            .attr_str(IFLA_IFNAME, name)
            .begin_nested(IFLA_LINKINFO)
            .attr_str(IFLA_INFO_KIND, "bridge")
            .end_nested();
        self.request("create bridge", msg)
    }

    /// Creates the veth pair `name`/`peer`, setting `peer_mac` on the peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn create_veth(&mut self, name: &str, peer: &str, peer_mac: [u8; 6]) -> Result<()> {
        let msg = Message::new(RTM_NEWLINK, NLM_F_CREATE | NLM_F_EXCL)
            .ifinfo(0, 0, 0)
            .attr_str(IFLA_IFNAME, name)
            .begin_nested(IFLA_LINKINFO)
            .attr_str(IFLA_INFO_KIND, "veth")
            .begin_nested(IFLA_INFO_DATA)
            .begin_nested(VETH_INFO_PEER)
            .raw(&empty_ifinfo())
            .attr_str(IFLA_IFNAME, peer)
            .attr(IFLA_ADDRESS, &peer_mac)
            .end_nested()
            .end_nested()
            .end_nested();
        self.request("create veth", msg)
    }

    /// Deletes link `index`; deleting one veth end removes the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn delete_link(&mut self, index: u32) -> Result<()> {
        let msg = Message::new(RTM_DELLINK, 0).ifinfo(as_index(index), 0, 0);
        self.request("delete link", msg)
    }

    /// Brings link `index` up.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn set_up(&mut self, index: u32) -> Result<()> {
        let msg = Message::new(RTM_NEWLINK, 0).ifinfo(as_index(index), IFF_UP, IFF_UP);
        self.request("link up", msg)
    }

    /// Enslaves link `index` to bridge `master`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn set_master(&mut self, index: u32, master: u32) -> Result<()> {
        let msg = Message::new(RTM_NEWLINK, 0)
            .ifinfo(as_index(index), 0, 0)
            .attr_u32(IFLA_MASTER, master);
        self.request("set master", msg)
    }

    /// Moves link `index` into the network namespace referred to by `ns_fd`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn set_netns(&mut self, index: u32, ns_fd: &impl AsRawFd) -> Result<()> {
        let fd = u32::try_from(ns_fd.as_raw_fd()).map_err(|e| HullError::kernel("netns fd", e))?;
        let msg = Message::new(RTM_NEWLINK, 0)
            .ifinfo(as_index(index), 0, 0)
            .attr_u32(IFLA_NET_NS_FD, fd);
        self.request("move link to netns", msg)
    }

    /// Assigns `addr` (address and prefix) to link `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn add_address(&mut self, index: u32, addr: Ipv4Network) -> Result<()> {
        let octets = addr.ip().octets();
        let msg = Message::new(RTM_NEWADDR, NLM_F_CREATE | NLM_F_EXCL)
            .ifaddr(addr.prefix(), index)
            .attr(IFA_LOCAL, &octets)
            .attr(IFA_ADDRESS, &octets);
        self.request("add address", msg)
    }

    /// Installs a default route through `gateway` on link `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel rejects the request.
    pub fn add_default_route(&mut self, index: u32, gateway: Ipv4Addr) -> Result<()> {
        let msg = Message::new(RTM_NEWROUTE, NLM_F_CREATE | NLM_F_EXCL)
            .rtmsg(0)
            .attr(RTA_GATEWAY, &gateway.octets())
            .attr_u32(RTA_OIF, index);
        self.request("add default route", msg)
    }
}

fn as_index(index: u32) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(buf: &[u8], at: usize) -> u16 {
        u16::from_ne_bytes([buf[at], buf[at + 1]])
    }

    fn u32_at(buf: &[u8], at: usize) -> u32 {
        u32::from_ne_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
    }

    #[test]
    fn header_carries_length_type_flags_and_seq() {
        let buf = Message::new(RTM_DELLINK, 0).ifinfo(7, 0, 0).finish(42);
        assert_eq!(buf.len(), NLMSG_HDR_LEN + 16);
        assert_eq!(u32_at(&buf, 0) as usize, buf.len());
        assert_eq!(u16_at(&buf, 4), RTM_DELLINK);
        assert_eq!(u16_at(&buf, 6), NLM_F_REQUEST | NLM_F_ACK);
        assert_eq!(u32_at(&buf, 8), 42);
        assert_eq!(u32_at(&buf, NLMSG_HDR_LEN + 4), 7);
    }

    #[test]
    fn string_attributes_are_terminated_and_padded() {
        let buf = Message::new(RTM_NEWLINK, 0).attr_str(IFLA_IFNAME, "br0").finish(1);
        let attr = &buf[NLMSG_HDR_LEN..];
        assert_eq!(u16_at(attr, 0), 8);
        assert_eq!(u16_at(attr, 2), IFLA_IFNAME);
        assert_eq!(&attr[4..8], b"br0\0");

        let buf = Message::new(RTM_NEWLINK, 0).attr_str(IFLA_IFNAME, "testnet").finish(1);
        assert_eq!(u16_at(&buf, NLMSG_HDR_LEN), 12);
        assert_eq!(buf.len() % 4, 0);
    }

    #[test]
    fn nested_attribute_length_spans_children() {
        let buf = Message::new(RTM_NEWLINK, 0)
            .begin_nested(IFLA_LINKINFO)
            .attr_str(IFLA_INFO_KIND, "bridge")
            .end_nested()
            .finish(1);
        let nest = &buf[NLMSG_HDR_LEN..];
        assert_eq!(u16_at(nest, 2), IFLA_LINKINFO | NLA_F_NESTED);
        // 4 (nest header) + 4 (kind header) + "bridge\0" padded to 8
        assert_eq!(u16_at(nest, 0), 16);
        assert_eq!(buf.len(), NLMSG_HDR_LEN + 16);
    }

    #[test]
    fn rtmsg_targets_main_table() {
        let buf = Message::new(RTM_NEWROUTE, NLM_F_CREATE).rtmsg(0).finish(1);
        let rt = &buf[NLMSG_HDR_LEN..];
        assert_eq!(rt.len(), 12);
        assert_eq!(rt[0], AF_INET);
        assert_eq!(rt[4], RT_TABLE_MAIN);
        assert_eq!(rt[7], RTN_UNICAST);
    }

    #[test]
    fn ack_parsing() {
        let mut reply = vec![0u8; NLMSG_HDR_LEN + 4];
        reply[4..6].copy_from_slice(&NLMSG_ERROR.to_ne_bytes());
        assert_eq!(parse_ack(&reply), Some(0));
        reply[NLMSG_HDR_LEN..].copy_from_slice(&(-17i32).to_ne_bytes());
        assert_eq!(parse_ack(&reply), Some(-17));
        assert_eq!(parse_ack(&reply[..8]), None);
    }

    #[test]
    fn loopback_has_an_index() {
        assert!(ifindex("lo").unwrap() > 0);
        assert!(ifindex("definitely-absent0").is_err());
    }
}
