// runtime script injected into proxied html so the page's own dynamic requests get rewritten too
//
// the script carries one declarative interception policy (what to hook, which element attributes
// hold urls, what to leave alone) and a small interpreter that installs the hooks the policy
// names. the rust side only decides the policy, the js never changes per request
use serde::Serialize;

/// attribute present on the injected script tag, used to never inject twice
pub const SHIM_MARKER: &str = "data-watchproxy-shim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimParams {
    pub proxy_endpoint: String,
    /// what `document.referrer` should report inside the page
    pub original_referer: String,
    pub target_origin: String,
    pub current_page_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ElementRule {
    tag: &'static str,
    constructor: &'static str,
    attribute: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InterceptionPolicy<'a> {
    proxy_endpoint: &'a str,
    spoofed_referer: &'a str,
    spoofed_domain: String,
    target_origin: &'a str,
    page_url: &'a str,
    network: &'static [&'static str],
    mutation: &'static [&'static str],
    elements: Vec<ElementRule>,
    skip_prefixes: &'static [&'static str],
}

const NETWORK_HOOKS: &[&str] = &["fetch", "Request", "XMLHttpRequest.open"];

const MUTATION_HOOKS: &[&str] = &[
    "Node.appendChild",
    "Node.insertBefore",
    "Node.replaceChild",
    "Element.append",
    "Element.prepend",
    "Element.insertAdjacentElement",
    "Element.setAttribute",
];

const SKIP_PREFIXES: &[&str] = &["data:", "blob:", "javascript:", "about:", "mailto:", "#"];

fn element_rules() -> Vec<ElementRule> {
    vec![
        ElementRule {
            tag: "SCRIPT",
            constructor: "HTMLScriptElement",
            attribute: "src",
        },
        ElementRule {
            tag: "IFRAME",
            constructor: "HTMLIFrameElement",
            attribute: "src",
        },
        ElementRule {
            tag: "LINK",
            constructor: "HTMLLinkElement",
            attribute: "href",
        },
        ElementRule {
            tag: "IMG",
            constructor: "HTMLImageElement",
            attribute: "src",
        },
        ElementRule {
            tag: "SOURCE",
            constructor: "HTMLSourceElement",
            attribute: "src",
        },
        ElementRule {
            tag: "VIDEO",
            constructor: "HTMLMediaElement",
            attribute: "src",
        },
        ElementRule {
            tag: "AUDIO",
            constructor: "HTMLMediaElement",
            attribute: "src",
        },
    ]
}

const INTERPRETER: &str = r#"(function (policy) {
  if (window.__watchproxyShim) { return; }
  window.__watchproxyShim = true;

  var rules = {};
  policy.elements.forEach(function (rule) { rules[rule.tag] = rule; });

  function absolute(value) {
    if (value.indexOf('//') === 0) { return 'https:' + value; }
    if (/^https?:\/\//i.test(value)) {
      if (value.indexOf(location.origin + '/') === 0) {
        return policy.targetOrigin + value.substring(location.origin.length);
      }
      return value;
    }
    if (value.charAt(0) === '/') { return policy.targetOrigin + value; }
    try { return new URL(value, policy.pageUrl).href; } catch (e) { return null; }
  }

  function rewrite(input) {
    if (input === null || input === undefined) { return input; }
    var value = String(input).trim();
    var lowered = value.toLowerCase();
    if (!value || value.indexOf(policy.proxyEndpoint) === 0) { return input; }
    for (var i = 0; i < policy.skipPrefixes.length; i++) {
      if (lowered.indexOf(policy.skipPrefixes[i]) === 0) { return input; }
    }
    var target = absolute(value);
    if (!target || !/^https?:/i.test(target)) { return input; }
    return policy.proxyEndpoint + '?url=' + encodeURIComponent(target) +
      '&referer=' + encodeURIComponent(policy.pageUrl);
  }

  function fixElement(node) {
    if (!node || node.nodeType !== 1) { return node; }
    var rule = rules[node.tagName];
    if (rule) {
      var current = node.getAttribute(rule.attribute);
      var next = rewrite(current);
      if (current && next !== current) { nativeSetAttribute.call(node, rule.attribute, next); }
    }
    if (node.querySelectorAll) {
      Array.prototype.forEach.call(node.querySelectorAll('script[src],iframe[src],link[href],img[src],source[src],video[src],audio[src]'), fixElement);
    }
    return node;
  }

  var nativeSetAttribute = Element.prototype.setAttribute;

  var network = {
    'fetch': function () {
      if (!window.fetch) { return; }
      var nativeFetch = window.fetch;
      window.fetch = function (resource, init) {
        if (resource instanceof Request) {
          resource = new Request(rewrite(resource.url), resource);
        } else {
          resource = rewrite(resource instanceof URL ? resource.href : resource);
        }
        return nativeFetch.call(this, resource, init);
      };
    },
    'Request': function () {
      if (!window.Request) { return; }
      var NativeRequest = window.Request;
      var Patched = function (resource, init) {
        if (resource instanceof NativeRequest) { return new NativeRequest(rewrite(resource.url), resource); }
        return new NativeRequest(rewrite(resource instanceof URL ? resource.href : resource), init);
      };
      Patched.prototype = NativeRequest.prototype;
      window.Request = Patched;
    },
    'XMLHttpRequest.open': function () {
      var nativeOpen = XMLHttpRequest.prototype.open;
      XMLHttpRequest.prototype.open = function () {
        var args = Array.prototype.slice.call(arguments);
        args[1] = rewrite(args[1] instanceof URL ? args[1].href : args[1]);
        return nativeOpen.apply(this, args);
      };
    }
  };

  function wrapInsert(owner, name, positions) {
    var proto = window[owner] && window[owner].prototype;
    if (!proto || !proto[name]) { return; }
    var native = proto[name];
    proto[name] = function () {
      for (var i = 0; i < arguments.length; i++) {
        if (positions === 'all' || positions.indexOf(i) !== -1) { fixElement(arguments[i]); }
      }
      return native.apply(this, arguments);
    };
  }

  var mutation = {
    'Node.appendChild': function () { wrapInsert('Node', 'appendChild', [0]); },
    'Node.insertBefore': function () { wrapInsert('Node', 'insertBefore', [0]); },
    'Node.replaceChild': function () { wrapInsert('Node', 'replaceChild', [0]); },
    'Element.append': function () { wrapInsert('Element', 'append', 'all'); },
    'Element.prepend': function () { wrapInsert('Element', 'prepend', 'all'); },
    'Element.insertAdjacentElement': function () { wrapInsert('Element', 'insertAdjacentElement', [1]); },
    'Element.setAttribute': function () {
      Element.prototype.setAttribute = function (name, value) {
        var rule = rules[this.tagName];
        if (rule && String(name).toLowerCase() === rule.attribute) { value = rewrite(value); }
        return nativeSetAttribute.call(this, name, value);
      };
    }
  };

  policy.network.forEach(function (hook) { if (network[hook]) { network[hook](); } });
  policy.mutation.forEach(function (hook) { if (mutation[hook]) { mutation[hook](); } });

  policy.elements.forEach(function (rule) {
    var ctor = window[rule.constructor];
    if (!ctor) { return; }
    var descriptor = Object.getOwnPropertyDescriptor(ctor.prototype, rule.attribute);
    if (!descriptor || !descriptor.set) { return; }
    Object.defineProperty(ctor.prototype, rule.attribute, {
      configurable: true,
      enumerable: descriptor.enumerable,
      get: descriptor.get,
      set: function (value) {
        if (this.tagName === rule.tag) { value = rewrite(value); }
        return descriptor.set.call(this, value);
      }
    });
  });

  try {
    Object.defineProperty(Document.prototype, 'referrer', {
      configurable: true,
      get: function () { return policy.spoofedReferer; }
    });
  } catch (e) {}
  try {
    Object.defineProperty(Document.prototype, 'domain', {
      configurable: true,
      get: function () { return policy.spoofedDomain; },
      set: function () {}
    });
  } catch (e) {}
})("#;

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}

/// builds the `<script>` tag for one html response, same params always give the same output
pub fn build_shim(params: &ShimParams) -> String {
    let policy = InterceptionPolicy {
        proxy_endpoint: &params.proxy_endpoint,
        spoofed_referer: &params.original_referer,
        spoofed_domain: host_of(&params.original_referer),
        target_origin: &params.target_origin,
        page_url: &params.current_page_url,
        network: NETWORK_HOOKS,
        mutation: MUTATION_HOOKS,
        elements: element_rules(),
        skip_prefixes: SKIP_PREFIXES,
    };

    // serializing a struct of strings can't fail, the fallback keeps the page usable regardless
    let policy_json = serde_json::to_string(&policy)
        .unwrap_or_else(|_| "null".to_string())
        // a literal </script> inside a string would close our tag early
        .replace("</", "<\\/");

    format!(
        "<script {}>{}{});</script>",
        SHIM_MARKER, INTERPRETER, policy_json
    )
}
