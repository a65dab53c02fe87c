//! Function declarations evaluated on the remote side.
//!
//! Every declaration takes a single structured argument object. Values are
//! passed as call arguments, never spliced into the source text.

pub(super) const PING: &str = r#"function () {
  return { ready: document.readyState, url: String(location.href) };
}"#;

pub(super) const BRIDGE_INVOKE: &str = r#"async function (args) {
  const parts = args.path.split('.');
  const key = parts.pop();
  const owner = parts.reduce((obj, k) => (obj == null ? undefined : obj[k]), window);
  const shim = window.__BRIDGEPROBE_SHIM__;
  const invoke = shim ? shim.original : (owner ? owner[key] : undefined);
  const self = shim ? shim.owner : owner;
  if (typeof invoke !== 'function') {
    return { ok: false, unavailable: true };
  }
  try {
    const value = await invoke.call(self, args.command, args.args);
    return { ok: true, value: value === undefined ? null : value };
  } catch (e) {
    return { ok: false, error: e instanceof Error ? e.message : String(e) };
  }
}"#;

pub(super) const EMIT_EVENT: &str = r#"async function (args) {
  const parts = args.path.split('.');
  const key = parts.pop();
  const owner = parts.reduce((obj, k) => (obj == null ? undefined : obj[k]), window);
  const emit = owner ? owner[key] : undefined;
  if (typeof emit === 'function') {
    await emit.call(owner, args.event, args.payload);
    return { delivered: true, via: 'bridge' };
  }
  window.dispatchEvent(new CustomEvent(args.event, { detail: args.payload }));
  return { delivered: true, via: 'dom' };
}"#;

pub(super) const INSTALL_SHIM: &str = r#"function (args) {
  const mocks = {};
  for (const spec of args.mocks) {
    mocks[spec.command] = spec;
  }
  const existing = window.__BRIDGEPROBE_SHIM__;
  if (existing) {
    existing.mocks = mocks;
    return { installed: true, reused: true, mocks: args.mocks.length };
  }
  const parts = args.path.split('.');
  const key = parts.pop();
  const owner = parts.reduce((obj, k) => (obj == null ? undefined : obj[k]), window);
  if (!owner || typeof owner[key] !== 'function') {
    return { installed: false, reused: false, mocks: 0, reason: 'bridge entry point not found' };
  }
  const deepEqual = (a, b) => {
    if (a === b) return true;
    if (a === null || b === null || typeof a !== 'object' || typeof b !== 'object') return false;
    if (Array.isArray(a) !== Array.isArray(b)) return false;
    const ka = Object.keys(a);
    if (ka.length !== Object.keys(b).length) return false;
    return ka.every((k) => deepEqual(a[k], b[k]));
  };
  const matches = (expected, actual) => {
    if (expected === null || expected === undefined) return true;
    if (typeof expected !== 'object' || Array.isArray(expected)) return deepEqual(expected, actual);
    const source = actual || {};
    return Object.keys(expected).every((k) => deepEqual(expected[k], source[k]));
  };
  const sleep = (ms) => new Promise((resolve) => setTimeout(resolve, ms));
  const run = async (instruction, callArgs) => {
    switch (instruction.op) {
      case 'respond':
        return instruction.value;
      case 'reject':
        throw new Error(instruction.message);
      case 'delay':
        await sleep(instruction.ms);
        return run(instruction.then, callArgs);
      case 'lookup': {
        const raw = (callArgs || {})[instruction.arg];
        const lookupKey = typeof raw === 'string' ? raw : JSON.stringify(raw);
        if (Object.prototype.hasOwnProperty.call(instruction.table, lookupKey)) {
          return instruction.table[lookupKey];
        }
        if ('fallback' in instruction) return instruction.fallback;
        throw new Error('no lookup entry for ' + instruction.arg + '=' + lookupKey);
      }
      default:
        throw new Error('unknown instruction ' + instruction.op);
    }
  };
  const shim = { original: owner[key], owner, key, mocks, history: [] };
  const record = (entry) => shim.history.push(entry);
  const wrapper = async (command, callArgs, options) => {
    const timestamp = Date.now();
    const started = performance.now();
    const spec = shim.mocks[command];
    const intercepted = Boolean(spec) && matches(spec.matchArgs, callArgs);
    if (intercepted && spec.once) {
      delete shim.mocks[command];
    }
    try {
      const value = intercepted
        ? await run(spec.instruction, callArgs)
        : await shim.original.call(shim.owner, command, callArgs, options);
      record({ command, args: callArgs ?? null, response: value ?? null, timestamp,
        duration: performance.now() - started, intercepted });
      return value;
    } catch (e) {
      const message = e instanceof Error ? e.message : String(e);
      record({ command, args: callArgs ?? null, error: message, timestamp,
        duration: performance.now() - started, intercepted });
      throw intercepted ? message : e;
    }
  };
  owner[key] = wrapper;
  if (owner[key] !== wrapper) {
    return { installed: false, reused: false, mocks: 0, reason: 'bridge entry point is read-only' };
  }
  window.__BRIDGEPROBE_SHIM__ = shim;
  return { installed: true, reused: false, mocks: args.mocks.length };
}"#;

pub(super) const UNINSTALL_SHIM: &str = r#"function () {
  const shim = window.__BRIDGEPROBE_SHIM__;
  if (!shim) return { removed: false, pending: 0 };
  shim.owner[shim.key] = shim.original;
  delete window.__BRIDGEPROBE_SHIM__;
  return { removed: true, pending: shim.history.length };
}"#;

pub(super) const DRAIN_SHIM_HISTORY: &str = r#"function () {
  const shim = window.__BRIDGEPROBE_SHIM__;
  if (!shim) return [];
  const records = shim.history;
  shim.history = [];
  return records;
}"#;

pub(super) const SAMPLE_WINDOW: &str = r#"function (args) {
  const container = document.querySelector(args.container);
  if (!container) return { found: false, items: [] };
  const boundsOf = (el) => {
    const r = el.getBoundingClientRect();
    return { x: r.x, y: r.y, width: r.width, height: r.height };
  };
  const attributesOf = (el) => {
    const out = {};
    for (const attr of el.attributes) out[attr.name] = attr.value;
    return out;
  };
  const items = Array.from(container.querySelectorAll(args.item)).map((el) => ({
    text: (el.innerText || el.textContent || '').trim(),
    attributes: attributesOf(el),
    bounds: boundsOf(el),
  }));
  return {
    found: true,
    container: {
      scrollTop: container.scrollTop,
      scrollHeight: container.scrollHeight,
      clientHeight: container.clientHeight,
      bounds: boundsOf(container),
      attributes: attributesOf(container),
    },
    items,
  };
}"#;

pub(super) const SCROLL_CONTAINER: &str = r#"function (args) {
  const container = document.querySelector(args.container);
  if (!container) return { found: false, scrollTop: 0 };
  const top = typeof args.by === 'number' ? container.scrollTop + args.by : args.top;
  container.scrollTo({ top, behavior: args.behavior });
  return { found: true, scrollTop: container.scrollTop };
}"#;

pub(super) const MEASURE_SCROLL: &str = r#"function (args) {
  const container = document.querySelector(args.container);
  if (!container) return { found: false };
  return new Promise((resolve) => {
    const frameTimes = [];
    const start = performance.now();
    const startTop = container.scrollTop;
    let last = start;
    let itemsRendered = 0;
    const tick = (now) => {
      frameTimes.push(now - last);
      last = now;
      const elapsed = now - start;
      const progress = Math.min(1, elapsed / args.duration);
      container.scrollTop = startTop + args.distance * progress;
      itemsRendered = Math.max(itemsRendered, container.querySelectorAll(args.item).length);
      if (elapsed < args.duration) {
        requestAnimationFrame(tick);
      } else {
        resolve({
          found: true,
          frameTimes,
          duration: elapsed,
          distance: Math.abs(container.scrollTop - startTop),
          itemsRendered,
        });
      }
    };
    requestAnimationFrame(tick);
  });
}"#;
